//! Token encoding, decoding, and verification.
//!
//! Both token kinds are HS256 JWTs signed with per-kind secrets. The
//! `kind` claim is read from the unverified payload only to select the
//! secret; the signature, expiry, not-before, issuer, audience and
//! required-claims checks then run against that secret, and the kind is
//! re-checked on the verified claims.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode};
use uuid::Uuid;

use super::AuthError;
use crate::id::random_token_id;
use crate::models::auth::{TokenClaims, TokenKind, User};

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

/// The only accepted signing algorithm. A token whose header declares
/// anything else is rejected before signature verification.
const SIGNING_ALG: Algorithm = Algorithm::HS256;

/// Encodes and verifies both token kinds.
#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl TokenCodec {
    pub fn new(access_secret: &str, refresh_secret: &str, issuer: &str, audience: &str) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        }
    }

    /// Issue a signed access token for a shadow user.
    pub fn issue_access(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let iat = now.timestamp();
        let claims = TokenClaims {
            sub: user.external_id.clone(),
            role: Some(user.role.clone()),
            email: user.email.clone(),
            name: user.name.clone(),
            kind: TokenKind::Access,
            jti: Uuid::new_v4().to_string(),
            iat,
            nbf: iat,
            exp: (now + Duration::seconds(ACCESS_TOKEN_EXPIRY_SECS)).timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        self.sign(&claims)
    }

    /// Issue a signed refresh token. Returns the token, its identifier
    /// (the `jti` claim, used as the store record id) and its expiry.
    pub fn issue_refresh(
        &self,
        user_id: &str,
    ) -> Result<(String, String, chrono::DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let iat = now.timestamp();
        let token_id = random_token_id();
        let expires_at = now + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);
        let claims = TokenClaims {
            sub: user_id.to_string(),
            role: None,
            email: None,
            name: None,
            kind: TokenKind::Refresh,
            jti: token_id.clone(),
            iat,
            nbf: iat,
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = self.sign(&claims)?;
        Ok((token, token_id, expires_at))
    }

    /// Verify a token of the expected kind, returning its claims.
    ///
    /// Returns `None` (never errors) on any failure: bad signature,
    /// expired, not yet valid, wrong kind, wrong issuer/audience,
    /// non-HS256 header, or missing required claims.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Option<TokenClaims> {
        let header = decode_header(token).ok()?;
        if header.alg != SIGNING_ALG {
            return None;
        }
        let kind = peek_kind(token)?;
        if kind != expected {
            return None;
        }
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };
        let mut validation = Validation::new(SIGNING_ALG);
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "sub"]);
        let data = decode::<TokenClaims>(token, key, &validation).ok()?;
        if data.claims.kind != expected {
            return None;
        }
        Some(data.claims)
    }

    /// Sign claims with the secret matching their kind.
    pub(crate) fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        let key = match claims.kind {
            TokenKind::Access => &self.access_encoding,
            TokenKind::Refresh => &self.refresh_encoding,
        };
        encode(&Header::new(SIGNING_ALG), claims, key)
            .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
    }
}

/// Read the `kind` claim from the unverified payload segment.
///
/// Used only to pick the decoding secret; nothing read here is trusted
/// until the signature check passes.
fn peek_kind(token: &str) -> Option<TokenKind> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    match value.get("kind")?.as_str()? {
        "access" => Some(TokenKind::Access),
        "refresh" => Some(TokenKind::Refresh),
        _ => None,
    }
}
