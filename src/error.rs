//! Error Types
//!
//! One taxonomy for every operation; the mapping to HTTP status codes lives
//! here and nowhere else.

use crate::store::StoreError;
use crate::tokens::TokenError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Message returned for every rejected token, whatever the cause
pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// Message returned when no bearer token was sent
pub const NOT_AUTHENTICATED: &str = "Not authenticated";

/// Message returned for unknown email and wrong password alike
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Application errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Admin privileges required")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error")]
    Internal,
}

impl AppError {
    /// HTTP status and machine-readable code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::NotImplemented(_) => (StatusCode::NOT_IMPLEMENTED, "not_implemented"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            AppError::Store(_) | AppError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let message = match &self {
            AppError::Store(err) => {
                tracing::error!("Storage error: {:?}", err);
                "An internal error occurred".to_string()
            }
            AppError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                "Server configuration error".to_string()
            }
            AppError::Internal => "An internal error occurred".to_string(),
            AppError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        };

        (
            status,
            Json(serde_json::json!({
                "error": error_code,
                "message": message
            })),
        )
            .into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        tracing::debug!("Token rejected: {:?}", err);
        AppError::Unauthorized(INVALID_TOKEN)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("Password hashing error: {:?}", err);
        AppError::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("x".into()).status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_and_code().0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Unauthorized(INVALID_TOKEN).status_and_code().0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status_and_code().0, StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::NotFound("x".into()).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::NotImplemented("x".into()).status_and_code().0,
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            AppError::Internal.status_and_code().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_errors_collapse_to_one_message() {
        for err in [
            TokenError::InvalidSignature,
            TokenError::Expired,
            TokenError::AudienceMismatch,
            TokenError::IssuerMismatch,
            TokenError::Malformed,
        ] {
            match AppError::from(err) {
                AppError::Unauthorized(msg) => assert_eq!(msg, INVALID_TOKEN),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}
