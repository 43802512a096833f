use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Domain errors, converted into structured JSON at the HTTP boundary.
///
/// `InvalidLink` deliberately covers three distinct reset failures (bad
/// uidb64, unknown user, mismatched token) so callers cannot probe which
/// case occurred.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("email or username already exist!")]
    DuplicateIdentity,
    #[error("{0}")]
    AuthenticationFailed(String),
    #[error("invalid token")]
    InvalidToken,
    #[error("activation expired")]
    ExpiredToken,
    #[error("invalid link")]
    InvalidLink,
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateIdentity => ApiError::DuplicateIdentity,
            other => ApiError::Internal(other.into()),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::DuplicateIdentity => StatusCode::BAD_REQUEST,
            ApiError::InvalidToken | ApiError::ExpiredToken => StatusCode::BAD_REQUEST,
            ApiError::AuthenticationFailed(_) | ApiError::InvalidLink => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            // Registration-family errors keep the `message`/`code` shape.
            ApiError::Validation(_) | ApiError::DuplicateIdentity => {
                json!({ "message": self.to_string(), "code": status.as_u16() })
            }
            ApiError::Internal(err) => {
                log::error!("internal error: {:#}", err);
                json!({ "error_message": "internal server error", "status_code": status.as_u16() })
            }
            _ => json!({ "error_message": self.to_string(), "status_code": status.as_u16() }),
        };
        HttpResponse::build(status).json(body)
    }
}
