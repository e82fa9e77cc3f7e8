//! Token issuance, rotation, and revocation.
//!
//! Refresh tokens are strictly single-use. Reuse of a rotated token,
//! a hash mismatch, or losing the rotation race are all treated as the
//! same security event: the user's whole token family is revoked.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::codec::{ACCESS_TOKEN_EXPIRY_SECS, TokenCodec};
use super::store::RefreshTokenStore;
use super::{AuthError, hash_token};
use crate::models::auth::{ClientInfo, RefreshTokenRecord, TokenKind, TokenPair, User};
use crate::users::UserStore;

/// Orchestrates the token lifecycle against the codec and stores.
pub struct TokenService {
    codec: TokenCodec,
    store: Arc<dyn RefreshTokenStore>,
    users: Arc<dyn UserStore>,
}

impl TokenService {
    pub fn new(
        codec: TokenCodec,
        store: Arc<dyn RefreshTokenStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self { codec, store, users }
    }

    /// Issue a fresh access/refresh pair for an authenticated user and
    /// persist the refresh record.
    pub async fn login(&self, user: &User, client: &ClientInfo) -> Result<TokenPair, AuthError> {
        self.issue_pair(user, client).await
    }

    /// Exchange a refresh token for a new pair (single-use rotation).
    pub async fn refresh(
        &self,
        presented: &str,
        client: &ClientInfo,
    ) -> Result<TokenPair, AuthError> {
        let claims = self
            .codec
            .verify(presented, TokenKind::Refresh)
            .ok_or_else(|| AuthError::TokenError("Invalid refresh token".into()))?;

        let record = self
            .store
            .find(&claims.jti, &claims.sub)
            .await?
            .ok_or_else(|| AuthError::TokenError("Unknown refresh token".into()))?;

        let now = Utc::now();
        if record.revoked_at.is_some() {
            // Replay of an already-rotated token.
            warn!(user_id = %claims.sub, token_id = %claims.jti, "revoked refresh token replayed, revoking token family");
            self.store.revoke_all(&claims.sub).await?;
            return Err(AuthError::ReplayDetected);
        }
        if record.expires_at <= now {
            return Err(AuthError::TokenError("Refresh token expired".into()));
        }

        // A stolen or forged token cannot be told apart from the real
        // one except by this mismatch, so the whole family goes.
        if hash_token(presented) != record.token_hash {
            warn!(user_id = %claims.sub, token_id = %claims.jti, "refresh token hash mismatch, revoking token family");
            self.store.revoke_all(&claims.sub).await?;
            return Err(AuthError::ReplayDetected);
        }

        // Serialization point: only one concurrent attempt can flip the
        // record from live to revoked. The loser takes the breach path.
        if !self.store.revoke(&claims.jti).await? {
            warn!(user_id = %claims.sub, token_id = %claims.jti, "lost refresh rotation race, revoking token family");
            self.store.revoke_all(&claims.sub).await?;
            return Err(AuthError::ReplayDetected);
        }

        let user = self
            .users
            .find_by_external_id(&claims.sub)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .filter(|u| u.active)
            .ok_or_else(|| AuthError::TokenError("Unknown or inactive subject".into()))?;

        self.issue_pair(&user, client).await
    }

    /// Revoke a single refresh token. Explicit logout.
    pub async fn revoke(&self, token_id: &str) -> Result<bool, AuthError> {
        self.store.revoke(token_id).await
    }

    /// Revoke a single refresh token, but only if it belongs to the
    /// given user. Keeps one caller from logging out another.
    pub async fn revoke_owned(&self, token_id: &str, user_id: &str) -> Result<bool, AuthError> {
        match self.store.find(token_id, user_id).await? {
            Some(_) => self.store.revoke(token_id).await,
            None => Ok(false),
        }
    }

    /// Revoke every refresh token for a user. Logout-everywhere or
    /// admin action.
    pub async fn revoke_all(&self, user_id: &str) -> Result<u64, AuthError> {
        let revoked = self.store.revoke_all(user_id).await?;
        info!(user_id, revoked, "revoked all refresh tokens");
        Ok(revoked)
    }

    async fn issue_pair(&self, user: &User, client: &ClientInfo) -> Result<TokenPair, AuthError> {
        let access_token = self.codec.issue_access(user)?;
        let (refresh_token, token_id, expires_at) =
            self.codec.issue_refresh(&user.external_id)?;
        self.store
            .insert(RefreshTokenRecord {
                id: token_id,
                user_id: user.external_id.clone(),
                token_hash: hash_token(&refresh_token),
                expires_at,
                revoked_at: None,
                created_at: Utc::now(),
                user_agent: client.user_agent.clone(),
                ip: client.ip.clone(),
            })
            .await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: ACCESS_TOKEN_EXPIRY_SECS,
        })
    }
}
