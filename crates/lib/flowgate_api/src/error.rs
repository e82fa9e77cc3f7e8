//! Application error types.
//!
//! Pre-stream failures map to ordinary HTTP error responses here.
//! Failures after a stream has started never pass through this type —
//! the relay serializes them as in-band events instead.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use flowgate_core::auth::AuthError;
use flowgate_core::clients::engine::EngineError;
use flowgate_core::clients::identity::IdentityError;
use flowgate_core::credits::CreditError;
use flowgate_core::users::UserError;

use crate::dto::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient credits: {0}")]
    InsufficientCredits(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::InsufficientCredits(m) => {
                (StatusCode::PAYMENT_REQUIRED, "insufficient_credits", m.as_str())
            }
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::UpstreamUnavailable(m) => {
                (StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable", m.as_str())
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::CredentialError => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::TokenError(msg) => AppError::Unauthorized(msg),
            // Containment already ran; the caller learns nothing more
            // than any other invalid token would tell them.
            AuthError::ReplayDetected => AppError::Unauthorized("Invalid refresh token".into()),
            AuthError::DbError(e) => AppError::Internal(e.to_string()),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<CreditError> for AppError {
    fn from(e: CreditError) -> Self {
        match e {
            CreditError::Insufficient { .. } => AppError::InsufficientCredits(e.to_string()),
            CreditError::Unavailable(msg) => AppError::UpstreamUnavailable(msg),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidCredentials => {
                AppError::Unauthorized("Invalid credentials".into())
            }
            IdentityError::Unavailable(msg) | IdentityError::Protocol(msg) => {
                AppError::UpstreamUnavailable(msg)
            }
        }
    }
}

impl From<UserError> for AppError {
    fn from(e: UserError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::UnknownFlow(flow) => AppError::NotFound(format!("Unknown flow: {flow}")),
            other => AppError::UpstreamUnavailable(other.to_string()),
        }
    }
}
