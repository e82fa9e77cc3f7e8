//! API server configuration.

use flowgate_core::auth::secrets::resolve_token_secret;
use flowgate_core::models::auth::TokenKind;

/// What to do when the flow existence check cannot be completed
/// because the engine catalog is unreachable. An explicit decision,
/// not a silent fallback: `FailOpen` proceeds (the prediction call
/// itself will still fail if the flow is truly gone), `FailClosed`
/// rejects up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationMode {
    FailOpen,
    FailClosed,
}

impl ValidationMode {
    fn parse(value: &str) -> Self {
        match value {
            "fail-closed" => ValidationMode::FailClosed,
            _ => ValidationMode::FailOpen,
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3200").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Signing secret for access tokens.
    pub access_token_secret: String,
    /// Signing secret for refresh tokens.
    pub refresh_token_secret: String,
    /// JWT `iss` claim.
    pub token_issuer: String,
    /// JWT `aud` claim.
    pub token_audience: String,
    /// Identity provider base URL.
    pub identity_base_url: String,
    /// Credit ledger base URL.
    pub ledger_base_url: String,
    /// Upstream flow engine base URL.
    pub engine_base_url: String,
    /// Optional API key for the upstream engine.
    pub engine_api_key: Option<String>,
    /// Fixed cost of one prediction, in credits.
    pub prediction_cost: i64,
    /// Bound on the ledger balance + deduct sequence, in milliseconds.
    pub admission_timeout_ms: u64,
    /// Behavior when the flow existence check is unavailable.
    pub flow_validation: ValidationMode,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible
    /// defaults.
    ///
    /// | Variable               | Default                                  |
    /// |------------------------|------------------------------------------|
    /// | `BIND_ADDR`            | `127.0.0.1:3200`                         |
    /// | `DATABASE_URL`         | `postgres://localhost:5432/flowgate`     |
    /// | `ACCESS_TOKEN_SECRET`  | generated & persisted to file            |
    /// | `REFRESH_TOKEN_SECRET` | generated & persisted to file            |
    /// | `TOKEN_ISSUER`         | `flowgate`                               |
    /// | `TOKEN_AUDIENCE`       | `flowgate-clients`                       |
    /// | `IDENTITY_BASE_URL`    | `http://localhost:3210/`                 |
    /// | `LEDGER_BASE_URL`      | `http://localhost:3220/`                 |
    /// | `ENGINE_BASE_URL`      | `http://localhost:3000/`                 |
    /// | `ENGINE_API_KEY`       | unset                                    |
    /// | `PREDICTION_COST`      | `1`                                      |
    /// | `ADMISSION_TIMEOUT_MS` | `5000`                                   |
    /// | `FLOW_VALIDATION`      | `fail-open`                              |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3200".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/flowgate".into()),
            access_token_secret: resolve_token_secret(TokenKind::Access),
            refresh_token_secret: resolve_token_secret(TokenKind::Refresh),
            token_issuer: std::env::var("TOKEN_ISSUER").unwrap_or_else(|_| "flowgate".into()),
            token_audience: std::env::var("TOKEN_AUDIENCE")
                .unwrap_or_else(|_| "flowgate-clients".into()),
            identity_base_url: std::env::var("IDENTITY_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3210/".into()),
            ledger_base_url: std::env::var("LEDGER_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3220/".into()),
            engine_base_url: std::env::var("ENGINE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000/".into()),
            engine_api_key: std::env::var("ENGINE_API_KEY").ok().filter(|k| !k.is_empty()),
            prediction_cost: std::env::var("PREDICTION_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            admission_timeout_ms: std::env::var("ADMISSION_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            flow_validation: ValidationMode::parse(
                &std::env::var("FLOW_VALIDATION").unwrap_or_default(),
            ),
        }
    }
}
