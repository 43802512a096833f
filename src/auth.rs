use argon2::{
    password_hash::{
        rand_core::OsRng,
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString
    },
    Argon2
};
use jsonwebtoken::{encode, decode, Header, Algorithm, EncodingKey, DecodingKey, Validation};
use serde::{Serialize, Deserialize};
use chrono::{Utc, Duration};
use anyhow::{Result, Context, anyhow};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use rand::RngCore;

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let algo = Argon2::default();
    let password_hash = algo
        .hash_password(password.as_bytes(), &salt)
        .context("Failed to hash password")?;
    Ok(password_hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash).context("Failed to parse password hash")?;
    let algo = Argon2::default();
    match algo.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false), // Incorrect password
        Err(e) => Err(e).context("Failed to verify password"),
    }
}

#[derive(Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn create_access_token(user_id: i64, secret: &str, lifetime_minutes: i64) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::minutes(lifetime_minutes))
        .ok_or_else(|| anyhow!("access token expiry overflowed"))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    let token = encode(&Header::new(Algorithm::HS256), &claims, &key)
        .context("Failed to create JWT")?;
    Ok(token)
}

pub fn verify_access_token(token: &str, secret: &str) -> Result<i64> {
    let validation = Validation::new(Algorithm::HS256);
    let key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &key, &validation)
        .context("Failed to verify JWT")?;
    token_data
        .claims
        .sub
        .parse()
        .context("JWT subject is not a user id")
}

pub fn generate_refresh_token() -> String {
    let mut random_bytes = [0u8; 32]; // 256 bits
    OsRng.fill_bytes(&mut random_bytes);
    STANDARD_NO_PAD.encode(random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("pw123456").unwrap();
        assert_ne!(hash, "pw123456");
        assert!(verify_password(&hash, "pw123456").unwrap());
        assert!(!verify_password(&hash, "wrong-password").unwrap());
    }

    #[test]
    fn access_token_roundtrip() {
        let token = create_access_token(42, "test-secret", 30).unwrap();
        assert_eq!(verify_access_token(&token, "test-secret").unwrap(), 42);
    }

    #[test]
    fn access_token_rejects_wrong_secret() {
        let token = create_access_token(42, "test-secret", 30).unwrap();
        assert!(verify_access_token(&token, "other-secret").is_err());
    }

    #[test]
    fn refresh_tokens_are_unique() {
        assert_ne!(generate_refresh_token(), generate_refresh_token());
    }
}
