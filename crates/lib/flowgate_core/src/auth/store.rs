//! Refresh token storage.
//!
//! The store is the serialization point for concurrent rotation:
//! `revoke` is a conditional update that succeeds only if the record
//! was live at the time of the write, so two racing refresh attempts
//! with the same token resolve to exactly one winner regardless of how
//! many gateway instances are running.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::PgPool;

use super::AuthError;
use crate::models::auth::RefreshTokenRecord;

/// Durable, queryable storage of refresh token metadata.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), AuthError>;

    /// Fetch a record by token id and owning user. Revoked and expired
    /// records are returned too; callers judge validity via
    /// [`RefreshTokenRecord::is_valid`] so that replay of a rotated
    /// token can be distinguished from an unknown one.
    async fn find(
        &self,
        token_id: &str,
        user_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Conditionally revoke a record. Returns `true` only if the record
    /// was live (non-revoked, non-expired) at the time of the write.
    async fn revoke(&self, token_id: &str) -> Result<bool, AuthError>;

    /// Revoke every live record for a user. Returns the count revoked.
    async fn revoke_all(&self, user_id: &str) -> Result<u64, AuthError>;

    /// Delete records past expiry. Defense-in-depth; the validity check
    /// already treats them as dead.
    async fn purge_expired(&self) -> Result<u64, AuthError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL store
// ---------------------------------------------------------------------------

/// PostgreSQL-backed store. Atomicity comes from single-row conditional
/// updates, so it holds across multiple gateway instances.
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type RecordRow = (
    String,
    String,
    String,
    chrono::DateTime<Utc>,
    Option<chrono::DateTime<Utc>>,
    chrono::DateTime<Utc>,
    Option<String>,
    Option<String>,
);

fn row_to_record(row: RecordRow) -> RefreshTokenRecord {
    let (id, user_id, token_hash, expires_at, revoked_at, created_at, user_agent, ip) = row;
    RefreshTokenRecord {
        id,
        user_id,
        token_hash,
        expires_at,
        revoked_at,
        created_at,
        user_agent,
        ip,
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO refresh_tokens \
             (id, user_id, token_hash, expires_at, revoked_at, created_at, user_agent, ip) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.token_hash)
        .bind(record.expires_at)
        .bind(record.revoked_at)
        .bind(record.created_at)
        .bind(&record.user_agent)
        .bind(&record.ip)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(
        &self,
        token_id: &str,
        user_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT id, user_id, token_hash, expires_at, revoked_at, created_at, user_agent, ip \
             FROM refresh_tokens WHERE id = $1 AND user_id = $2",
        )
        .bind(token_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_record))
    }

    async fn revoke(&self, token_id: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE id = $1 AND revoked_at IS NULL AND expires_at > now()",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all(&self, user_id: &str) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory store for tests and ephemeral single-instance deployments.
/// Per-entry mutation under the map's shard lock gives the same
/// conditional-revoke semantics as the SQL store.
#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    records: DashMap<String, RefreshTokenRecord>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), AuthError> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find(
        &self,
        token_id: &str,
        user_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self
            .records
            .get(token_id)
            .filter(|r| r.user_id == user_id)
            .map(|r| r.clone()))
    }

    async fn revoke(&self, token_id: &str) -> Result<bool, AuthError> {
        let now = Utc::now();
        match self.records.get_mut(token_id) {
            Some(mut record) if record.is_valid(now) => {
                record.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all(&self, user_id: &str) -> Result<u64, AuthError> {
        let now = Utc::now();
        let mut revoked = 0;
        for mut entry in self.records.iter_mut() {
            if entry.user_id == user_id && entry.revoked_at.is_none() {
                entry.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn purge_expired(&self) -> Result<u64, AuthError> {
        let now = Utc::now();
        let before = self.records.len();
        self.records.retain(|_, r| r.expires_at > now);
        Ok((before - self.records.len()) as u64)
    }
}
