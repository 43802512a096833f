use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::errors::ApiError;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if self.username.len() < 3 || self.username.len() > 255 {
            return Err(ApiError::Validation(
                "username must be between 3 and 255 characters".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub email: String,
    pub username: String,
    pub tokens: Tokens,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetCheckQuery {
    pub redirect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetNewPasswordRequest {
    pub password: String,
    pub token: String,
    pub uidb64: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let well_formed = email.len() >= 3
        && email.len() <= 255
        && email.split_once('@').map_or(false, |(local, domain)| {
            !local.is_empty() && domain.contains('.')
        });
    if !well_formed {
        return Err(ApiError::Validation("enter a valid email address".to_string()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 6 || password.len() > 128 {
        return Err(ApiError::Validation(
            "password must be between 6 and 128 characters".to_string(),
        ));
    }
    Ok(())
}
