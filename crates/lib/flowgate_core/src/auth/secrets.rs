//! Signing-secret resolution.
//!
//! Each token kind has its own secret: env var first, then a persisted
//! file under the data dir, generated on first run.

use std::path::PathBuf;

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;

use crate::models::auth::TokenKind;

/// Resolve the signing secret for a token kind.
///
/// Order: `ACCESS_TOKEN_SECRET` / `REFRESH_TOKEN_SECRET` env var →
/// persisted file → freshly generated (and persisted) secret.
pub fn resolve_token_secret(kind: TokenKind) -> String {
    let env_key = match kind {
        TokenKind::Access => "ACCESS_TOKEN_SECRET",
        TokenKind::Refresh => "REFRESH_TOKEN_SECRET",
    };
    if let Ok(secret) = std::env::var(env_key)
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = secret_path(kind);
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new token signing secret");
    secret
}

/// Path to the persisted secret file for a token kind.
fn secret_path(kind: TokenKind) -> PathBuf {
    let file = match kind {
        TokenKind::Access => "access-token-secret",
        TokenKind::Refresh => "refresh-token-secret",
    };
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flowgate")
        .join(file)
}
