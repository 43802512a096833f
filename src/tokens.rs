//! Token codecs for the email-verification and password-reset flows.
//!
//! The verification token is a stateless HS256 JWT: its validity is a pure
//! function of signature and clock, never of database state. The reset
//! token is derived from the user's current password hash with a keyed
//! HMAC, so changing the password invalidates every outstanding reset
//! token for that user without storing anything server-side.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::errors::ApiError;
use crate::models::User;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
pub struct VerificationClaims {
    pub user_id: i64,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a verification claim for `user_id`. Pure function of the id,
/// the clock and the secret.
pub fn issue_verification_token(
    user_id: i64,
    secret: &str,
    lifetime_minutes: i64,
) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = VerificationClaims {
        user_id,
        iat: now.timestamp(),
        exp: (now + Duration::minutes(lifetime_minutes)).timestamp(),
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), &claims, &key).map_err(|e| {
        ApiError::Internal(anyhow::Error::new(e).context("failed to sign verification token"))
    })
}

/// Checks signature and expiry, returning the embedded user id.
///
/// Expiry is reported separately from every other failure so the caller
/// can answer "activation expired" rather than "invalid token".
pub fn verify_verification_token(token: &str, secret: &str) -> Result<i64, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let key = DecodingKey::from_secret(secret.as_bytes());
    match decode::<VerificationClaims>(token, &key, &validation) {
        Ok(data) => Ok(data.claims.user_id),
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => Err(ApiError::ExpiredToken),
            _ => Err(ApiError::InvalidToken),
        },
    }
}

/// Derives a reset token from the user's mutable state.
///
/// Layout is `<ts_hex>-<mac_hex>` where the MAC covers the user id, the
/// current password hash and the issue timestamp. There is no stored
/// expiry: the token stays valid exactly until the password hash changes.
pub fn make_reset_token(user: &User, secret: &str) -> Result<String, ApiError> {
    let ts = Utc::now().timestamp();
    let mac = reset_mac(user.id, &user.password_hash, ts, secret)?;
    Ok(format!("{:x}-{}", ts, hex::encode(mac.finalize().into_bytes())))
}

/// Re-derives the expected token from current user state and compares in
/// constant time. Returns `false` for any malformed token.
pub fn check_reset_token(user: &User, token: &str, secret: &str) -> bool {
    let Some((ts_hex, mac_hex)) = token.split_once('-') else {
        return false;
    };
    let Ok(ts) = i64::from_str_radix(ts_hex, 16) else {
        return false;
    };
    let Ok(presented) = hex::decode(mac_hex) else {
        return false;
    };
    let Ok(mac) = reset_mac(user.id, &user.password_hash, ts, secret) else {
        return false;
    };
    mac.verify_slice(&presented).is_ok()
}

fn reset_mac(
    user_id: i64,
    password_hash: &str,
    ts: i64,
    secret: &str,
) -> Result<HmacSha256, ApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("invalid HMAC key")))?;
    mac.update(user_id.to_string().as_bytes());
    mac.update(b":");
    mac.update(password_hash.as_bytes());
    mac.update(b":");
    mac.update(ts.to_string().as_bytes());
    Ok(mac)
}

/// Reversible, unsigned encoding of the numeric user id carried next to
/// the reset token.
pub fn encode_uid(user_id: i64) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

pub fn decode_uid(uidb64: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64).ok()?;
    std::str::from_utf8(&bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(password_hash: &str) -> User {
        User {
            id: 7,
            email: "a@x.com".to_string(),
            username: "a@x.com".to_string(),
            password_hash: password_hash.to_string(),
            is_verified: false,
            is_active: true,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn verification_token_roundtrip() {
        let token = issue_verification_token(7, "test-secret", 30).unwrap();
        assert_eq!(verify_verification_token(&token, "test-secret").unwrap(), 7);
    }

    #[test]
    fn verification_token_rejects_wrong_secret() {
        let token = issue_verification_token(7, "other-secret", 30).unwrap();
        assert!(matches!(
            verify_verification_token(&token, "test-secret"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn verification_token_rejects_garbage() {
        assert!(matches!(
            verify_verification_token("not-a-jwt", "test-secret"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn verification_token_rejects_tampered_payload() {
        let token = issue_verification_token(7, "test-secret", 30).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(
            format!(
                "{{\"user_id\":8,\"iat\":0,\"exp\":{}}}",
                (Utc::now() + Duration::hours(1)).timestamp()
            )
            .as_bytes(),
        );
        parts[1] = &forged;
        let tampered = parts.join(".");
        assert!(matches!(
            verify_verification_token(&tampered, "test-secret"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn expired_verification_token_is_reported_distinctly() {
        let token = issue_verification_token(7, "test-secret", -10).unwrap();
        assert!(matches!(
            verify_verification_token(&token, "test-secret"),
            Err(ApiError::ExpiredToken)
        ));
    }

    #[test]
    fn reset_token_validates_against_unchanged_state() {
        let user = test_user("argon2-hash-v1");
        let token = make_reset_token(&user, "test-secret").unwrap();
        assert!(check_reset_token(&user, &token, "test-secret"));
    }

    #[test]
    fn reset_token_goes_stale_when_password_changes() {
        let user = test_user("argon2-hash-v1");
        let token = make_reset_token(&user, "test-secret").unwrap();

        let mut changed = user.clone();
        changed.password_hash = "argon2-hash-v2".to_string();
        assert!(!check_reset_token(&changed, &token, "test-secret"));
    }

    #[test]
    fn reset_token_rejects_wrong_secret_and_garbage() {
        let user = test_user("argon2-hash-v1");
        let token = make_reset_token(&user, "test-secret").unwrap();
        assert!(!check_reset_token(&user, &token, "other-secret"));
        assert!(!check_reset_token(&user, "123", "test-secret"));
        assert!(!check_reset_token(&user, "zz-zz", "test-secret"));
        assert!(!check_reset_token(&user, "", "test-secret"));
    }

    #[test]
    fn uid_codec_roundtrip() {
        let uidb64 = encode_uid(7);
        assert_eq!(decode_uid(&uidb64), Some(7));
    }

    #[test]
    fn uid_codec_rejects_garbage() {
        assert_eq!(decode_uid("!!!"), None);
        // decodes, but not to a number
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("abc")), None);
    }
}
