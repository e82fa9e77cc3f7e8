//! Token lifecycle: codec, refresh token store, and rotation protocol.

pub mod codec;
pub mod secrets;
pub mod service;
pub mod store;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Token error: {0}")]
    TokenError(String),

    /// Reuse of a rotated or forged refresh token. Triggers family-wide
    /// revocation; surfaces to callers as a generic 401.
    #[error("Refresh token replay detected")]
    ReplayDetected,

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// SHA-256 hash of a token string, hex-encoded, for at-rest storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
