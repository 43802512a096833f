use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::auth;
use crate::models::User;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email or username already taken")]
    DuplicateIdentity,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Hash(#[from] anyhow::Error),
}

/// Narrow persistence contract the token protocol works against. The
/// refresh-token operations are the session/blacklist side of the same
/// store: logout deletes the row.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn create(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<User, StoreError>;
    async fn set_verified(&self, user_id: i64) -> Result<(), StoreError>;
    async fn set_password(&self, user_id: i64, new_password: &str) -> Result<(), StoreError>;

    async fn insert_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError>;
    async fn find_refresh_token(&self, token: &str) -> Result<Option<(i64, i64)>, StoreError>;
    async fn delete_refresh_token(&self, token: &str) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    pool: SqlitePool,
}

const USER_COLUMNS: &str =
    "id, email, username, password_hash, is_verified, is_active, created_at, updated_at";

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                is_verified INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS refresh_tokens (
                token TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.message().contains("UNIQUE constraint failed"),
        _ => false,
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<User, StoreError> {
        let password_hash = auth::hash_password(password)?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO users (email, username, password_hash, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(email)
        .bind(username)
        .bind(&password_hash)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(e) if is_unique_violation(&e) => return Err(StoreError::DuplicateIdentity),
            Err(e) => return Err(e.into()),
        };

        Ok(User {
            id: result.last_insert_rowid(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash,
            is_verified: false,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    // Atomic single-row update; concurrent verifies overwrite idempotently.
    async fn set_verified(&self, user_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET is_verified = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_password(&self, user_id: i64, new_password: &str) -> Result<(), StoreError> {
        let password_hash = auth::hash_password(new_password)?;
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO refresh_tokens (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_refresh_token(&self, token: &str) -> Result<Option<(i64, i64)>, StoreError> {
        let row = sqlx::query_as::<_, (i64, i64)>(
            "SELECT user_id, expires_at FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
