use anyhow::{Context, Result};
use std::env;

/// Runtime configuration, read once at startup from the environment
/// (with `.env` support via dotenv).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Shared secret for the access JWT and both token codecs.
    pub secret_key: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    /// Public base URL of this service, embedded in emailed links.
    pub base_url: String,
    /// Default redirect target for password-reset links.
    pub frontend_url: String,
    /// When unset the mailer worker logs and drops outgoing email.
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let secret_key = env::var("SECRET_KEY").context("SECRET_KEY must be set")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let access_token_minutes = env_i64("ACCESS_TOKEN_MINUTES", 30)?;
        let refresh_token_days = env_i64("REFRESH_TOKEN_DAYS", 1)?;

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}", bind_addr));
        let frontend_url = env::var("FRONTEND_URL").unwrap_or_else(|_| base_url.clone());

        let smtp = match env::var("EMAIL_HOST") {
            Ok(host) => {
                let username =
                    env::var("EMAIL_HOST_USER").context("EMAIL_HOST_USER must be set")?;
                Some(SmtpConfig {
                    port: env_i64("EMAIL_PORT", 587)? as u16,
                    password: env::var("EMAIL_HOST_PASSWORD")
                        .context("EMAIL_HOST_PASSWORD must be set")?,
                    from_address: env::var("EMAIL_FROM")
                        .unwrap_or_else(|_| username.clone()),
                    host,
                    username,
                })
            }
            Err(_) => None,
        };

        Ok(Config {
            database_url,
            bind_addr,
            secret_key,
            access_token_minutes,
            refresh_token_days,
            base_url,
            frontend_url,
            smtp,
        })
    }
}

fn env_i64(name: &str, default: i64) -> Result<i64> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be an integer, got {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
