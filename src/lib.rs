pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod store;
pub mod tokens;

use actix_web::web;

/// Mounts every handler under `/auth`; shared between `main` and the
/// integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(handlers::register)
            .service(handlers::login)
            .service(handlers::logout)
            .service(handlers::verify_email)
            .service(handlers::refresh_token)
            .service(handlers::request_reset_email)
            .service(handlers::password_reset_check)
            .service(handlers::password_reset_complete)
            .service(handlers::profile),
    );
}
