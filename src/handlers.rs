use actix_web::http::header;
use actix_web::{get, patch, post, web, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use serde_json::json;

use crate::auth;
use crate::config::Config;
use crate::errors::ApiError;
use crate::mailer::{EmailJob, Mailer};
use crate::models::{
    validate_password, LoginRequest, LoginResponse, RefreshRequest, RegisterRequest,
    ResetCheckQuery, ResetRequest, SetNewPasswordRequest, Tokens, User, VerifyEmailQuery,
};
use crate::store::CredentialStore;
use crate::tokens;

#[post("/register")]
pub async fn register(
    body: web::Json<RegisterRequest>,
    store: web::Data<dyn CredentialStore>,
    config: web::Data<Config>,
    mailer: web::Data<Mailer>,
) -> Result<HttpResponse, ApiError> {
    body.validate()?;
    let user = store
        .create(&body.email, &body.username, &body.password)
        .await?;

    let token = tokens::issue_verification_token(
        user.id,
        &config.secret_key,
        config.access_token_minutes,
    )?;
    let link = format!("{}/auth/email-verify?token={}", config.base_url, token);
    mailer.enqueue(EmailJob::verification(&user.email, &user.username, &link));

    Ok(HttpResponse::Created().json(json!({ "message": "register successful!" })))
}

#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    store: web::Data<dyn CredentialStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let user = store
        .find_by_email(&body.email)
        .await?
        .ok_or_else(|| ApiError::AuthenticationFailed("invalid credentials".to_string()))?;

    if !auth::verify_password(&user.password_hash, &body.password)? {
        return Err(ApiError::AuthenticationFailed(
            "invalid credentials".to_string(),
        ));
    }
    if !user.is_active {
        return Err(ApiError::AuthenticationFailed(
            "account disabled, contact admin".to_string(),
        ));
    }
    if !user.is_verified {
        return Err(ApiError::AuthenticationFailed(
            "email is not verified".to_string(),
        ));
    }

    let access_token =
        auth::create_access_token(user.id, &config.secret_key, config.access_token_minutes)?;
    let new_refresh_token = auth::generate_refresh_token();
    let expires_at = (Utc::now() + Duration::days(config.refresh_token_days)).timestamp();
    store
        .insert_refresh_token(user.id, &new_refresh_token, expires_at)
        .await?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        email: user.email,
        username: user.username,
        tokens: Tokens {
            access_token,
            refresh_token: new_refresh_token,
        },
    }))
}

#[get("/email-verify")]
pub async fn verify_email(
    query: web::Query<VerifyEmailQuery>,
    store: web::Data<dyn CredentialStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let user_id = tokens::verify_verification_token(&query.token, &config.secret_key)?;
    let user = store
        .find_by_id(user_id)
        .await?
        .ok_or(ApiError::InvalidToken)?;

    // Re-verifying an already-verified user is a no-op success.
    if !user.is_verified {
        store.set_verified(user.id).await?;
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "email verified successfully!" })))
}

#[post("/request-reset-email")]
pub async fn request_reset_email(
    body: web::Json<ResetRequest>,
    store: web::Data<dyn CredentialStore>,
    config: web::Data<Config>,
    mailer: web::Data<Mailer>,
) -> Result<HttpResponse, ApiError> {
    let user = store
        .find_by_email(&body.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("no user with this email".to_string()))?;

    let token = tokens::make_reset_token(&user, &config.secret_key)?;
    let uidb64 = tokens::encode_uid(user.id);
    let mut link = format!(
        "{}/auth/password-reset/{}/{}",
        config.base_url, uidb64, token
    );
    if let Some(redirect_url) = &body.redirect_url {
        link.push_str("?redirect_url=");
        link.push_str(redirect_url);
    }
    mailer.enqueue(EmailJob::password_reset(&user.email, &user.username, &link));

    Ok(HttpResponse::Ok().json(json!({
        "message": "we have sent you a link to reset your password"
    })))
}

/// Resolves a reset link to its user, or `None` for every invalid case.
/// Bad uidb64, unknown user and stale token are indistinguishable to the
/// caller.
async fn user_for_valid_link(
    store: &dyn CredentialStore,
    secret: &str,
    uidb64: &str,
    token: &str,
) -> Result<Option<User>, ApiError> {
    let Some(user_id) = tokens::decode_uid(uidb64) else {
        return Ok(None);
    };
    let Some(user) = store.find_by_id(user_id).await? else {
        return Ok(None);
    };
    if !tokens::check_reset_token(&user, token, secret) {
        return Ok(None);
    }
    Ok(Some(user))
}

#[get("/password-reset/{uidb64}/{token}")]
pub async fn password_reset_check(
    path: web::Path<(String, String)>,
    query: web::Query<ResetCheckQuery>,
    store: web::Data<dyn CredentialStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let (uidb64, token) = path.into_inner();
    let valid = user_for_valid_link(store.get_ref(), &config.secret_key, &uidb64, &token)
        .await?
        .is_some();

    if let Some(redirect_url) = &query.redirect_url {
        let location = if valid {
            format!(
                "{}?token_valid=True&uidb64={}&token={}",
                redirect_url, uidb64, token
            )
        } else {
            format!("{}?token_valid=False", redirect_url)
        };
        return Ok(HttpResponse::Found()
            .append_header((header::LOCATION, location))
            .finish());
    }

    if !valid {
        return Err(ApiError::InvalidLink);
    }
    Ok(HttpResponse::Ok().json(json!({
        "message": "credentials valid",
        "uidb64": uidb64,
        "token": token,
    })))
}

#[patch("/password-reset-complete")]
pub async fn password_reset_complete(
    body: web::Json<SetNewPasswordRequest>,
    store: web::Data<dyn CredentialStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    validate_password(&body.password)?;

    let user = user_for_valid_link(store.get_ref(), &config.secret_key, &body.uidb64, &body.token)
        .await?
        .ok_or(ApiError::InvalidLink)?;

    // Rehashing the password implicitly consumes this token and every
    // other outstanding reset token for the user.
    store.set_password(user.id, &body.password).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "password reset successful!" })))
}

#[post("/logout")]
pub async fn logout(
    req: HttpRequest,
    body: web::Json<RefreshRequest>,
    store: web::Data<dyn CredentialStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    bearer_user_id(&req, &config.secret_key)
        .ok_or_else(|| ApiError::AuthenticationFailed("please login to proceed".to_string()))?;

    store.delete_refresh_token(&body.refresh_token).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/token/refresh")]
pub async fn refresh_token(
    body: web::Json<RefreshRequest>,
    store: web::Data<dyn CredentialStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let (user_id, expires_at) = store
        .find_refresh_token(&body.refresh_token)
        .await?
        .ok_or_else(|| ApiError::AuthenticationFailed("invalid refresh token".to_string()))?;

    if Utc::now().timestamp() > expires_at {
        store.delete_refresh_token(&body.refresh_token).await?;
        return Err(ApiError::AuthenticationFailed(
            "refresh token expired".to_string(),
        ));
    }

    let access_token =
        auth::create_access_token(user_id, &config.secret_key, config.access_token_minutes)?;

    Ok(HttpResponse::Ok().json(Tokens {
        access_token,
        refresh_token: body.refresh_token.clone(),
    }))
}

/// The profile view family answers unauthenticated requests with
/// `200 {is_logged_in: false}` instead of a raw 401.
#[get("/profile")]
pub async fn profile(
    req: HttpRequest,
    store: web::Data<dyn CredentialStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let logged_out = || json!({ "is_logged_in": false, "status_code": 200 });

    let Some(user_id) = bearer_user_id(&req, &config.secret_key) else {
        return Ok(HttpResponse::Ok().json(logged_out()));
    };
    match store.find_by_id(user_id).await? {
        Some(user) => Ok(HttpResponse::Ok().json(json!({
            "id": user.id,
            "email": user.email,
            "username": user.username,
            "is_verified": user.is_verified,
        }))),
        None => Ok(HttpResponse::Ok().json(logged_out())),
    }
}

fn bearer_user_id(req: &HttpRequest, secret: &str) -> Option<i64> {
    let header = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    auth::verify_access_token(token, secret).ok()
}
