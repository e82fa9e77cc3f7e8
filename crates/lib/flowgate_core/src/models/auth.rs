//! Authentication domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local shadow record of an identity-provider user.
///
/// The identity provider is authoritative; this record mirrors the
/// claims the gateway has seen so that authorization decisions never
/// need a provider round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Local primary key.
    pub id: Uuid,
    /// Identity-provider subject id (unique).
    pub external_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields the gateway is willing to copy into the shadow
/// record. Built either from verified token claims or from an
/// identity-provider response; `None` fields never overwrite stored
/// values.
#[derive(Debug, Clone, Default)]
pub struct ShadowProfile {
    pub external_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

/// The two token kinds, each signed with its own secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims carried by both token kinds.
///
/// Access tokens carry `role` (and optionally `email`/`name` for
/// shadow sync); refresh tokens carry only the subject, with `jti`
/// doubling as the stored record id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — identity-provider user id (standard JWT `sub` claim).
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: TokenKind,
    /// Unique token id; for refresh tokens, the store record id.
    pub jti: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Not before (unix timestamp, equals `iat`).
    pub nbf: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// An access/refresh pair as returned by login and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Refresh token record as persisted by the store.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    /// Token identifier (the token's `jti` claim).
    pub id: String,
    /// Owning user's identity-provider subject id.
    pub user_id: String,
    /// SHA-256 hex of the raw token. The raw token is never stored.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

impl RefreshTokenRecord {
    /// A record is valid while it is neither revoked nor past expiry.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// Client metadata captured at token issuance for forensic use.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

/// Normalized request principal produced by the auth middleware.
///
/// `token` is the raw bearer credential, retained so downstream
/// components can make authenticated on-behalf-of calls to the ledger.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub role: String,
    pub token: String,
}

impl Principal {
    /// Whether the principal holds the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }
}
