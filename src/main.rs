use actix_web::{web, App, HttpServer, middleware::Logger};
use actix_web::main;
use actix_cors::Cors;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use env_logger::Env;
use log::info;
use std::str::FromStr;
use std::sync::Arc;

use doorable_auth::config::Config;
use doorable_auth::mailer;
use doorable_auth::store::{CredentialStore, SqliteStore};

#[main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().expect("Invalid configuration");

    // Configure SQLite options to create the database file if it doesn't exist
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("Failed to create SQLite options")
        .create_if_missing(true)
        .to_owned();

    // Connect to the SQLite database with the configured options
    let pool = SqlitePool::connect_with(options)
        .await
        .expect("Failed to connect to the database");

    let store = SqliteStore::new(pool);
    store.migrate().await.expect("Failed to create tables");
    let store: Arc<dyn CredentialStore> = Arc::new(store);
    let store_data: web::Data<dyn CredentialStore> = web::Data::from(store);

    let mailer = mailer::spawn_worker(config.smtp.clone());

    let bind_addr = config.bind_addr.clone();
    info!("listening on {}", bind_addr);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(store_data.clone())
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(mailer.clone()))
            .configure(doorable_auth::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
