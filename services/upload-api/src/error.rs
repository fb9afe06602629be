//! Service error taxonomy
//!
//! Every failure a handler can produce maps to one structured JSON response
//! with a distinct kind. Upstream and storage failures log their detail
//! internally and answer with a generic message — internal error text never
//! reaches the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Convenience alias for handler return types.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid session or credential was presented
    #[error("not authenticated")]
    Unauthenticated,

    /// A revoked credential was presented
    #[error("token has been invalidated")]
    TokenInvalidated,

    /// The user has no delegated access credential for the upload API
    #[error("not authenticated with Google")]
    MissingDelegatedAccess,

    /// Signature mismatch, structural corruption, or expiry
    #[error("invalid token")]
    InvalidCredential(#[from] bearer::Error),

    /// The user explicitly declined consent at the provider
    #[error("consent denied")]
    ConsentDenied,

    /// Bad upload payload (wrong type, oversize, missing file)
    #[error("validation failed: {0}")]
    Validation(String),

    /// External identity or content API failure — detail stays in the logs
    #[error("upstream failure")]
    Upstream(String),

    /// Persistent store unavailable or constraint violation
    #[error("storage failure")]
    Storage(String),

    /// Anything uncaught — always opaque to the caller
    #[error("internal error")]
    Internal(String),
}

impl From<auth_store::StoreError> for ApiError {
    fn from(e: auth_store::StoreError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

impl From<google_auth::Error> for ApiError {
    fn from(e: google_auth::Error) -> Self {
        ApiError::Upstream(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Access denied. No valid session or token provided.".to_owned(),
            ),
            ApiError::TokenInvalidated => (
                StatusCode::UNAUTHORIZED,
                "token_invalidated",
                "Token has been invalidated".to_owned(),
            ),
            ApiError::MissingDelegatedAccess => (
                StatusCode::UNAUTHORIZED,
                "missing_delegated_access",
                "Not authenticated with Google".to_owned(),
            ),
            ApiError::InvalidCredential(_) => (
                StatusCode::FORBIDDEN,
                "invalid_credential",
                "Invalid token".to_owned(),
            ),
            ApiError::ConsentDenied => (
                StatusCode::FORBIDDEN,
                "consent_denied",
                "OAuth consent was denied".to_owned(),
            ),
            ApiError::Validation(m) => {
                (StatusCode::BAD_REQUEST, "validation_failure", m.clone())
            }
            ApiError::Upstream(detail) => {
                error!(detail = %detail, "upstream failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_failure",
                    "Upstream service error".to_owned(),
                )
            }
            ApiError::Storage(detail) => {
                error!(detail = %detail, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_failure",
                    "Storage error".to_owned(),
                )
            }
            ApiError::Internal(detail) => {
                error!(detail = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Something went wrong!".to_owned(),
                )
            }
        };

        let body = Json(serde_json::json!({
            "error": kind,
            "message": message,
        }));
        (status, body).into_response()
    }
}
