//! Local user shadow records.
//!
//! Upserts are idempotent and keyed on the identity-provider subject
//! id; `None` profile fields never overwrite stored values, so a
//! token that omits email/name cannot erase what a fuller profile
//! already wrote.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{ShadowProfile, User};

/// Role assigned when the profile carries none.
pub const DEFAULT_ROLE: &str = "enduser";

/// User store errors.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Storage of local shadow users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create or update the shadow record for a profile. Idempotent.
    async fn upsert_from_profile(&self, profile: &ShadowProfile) -> Result<User, UserError>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, UserError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL store
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type UserRow = (
    Uuid,
    String,
    Option<String>,
    Option<String>,
    String,
    bool,
    chrono::DateTime<Utc>,
    chrono::DateTime<Utc>,
);

fn row_to_user(row: UserRow) -> User {
    let (id, external_id, email, name, role, active, created_at, updated_at) = row;
    User {
        id,
        external_id,
        email,
        name,
        role,
        active,
        created_at,
        updated_at,
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn upsert_from_profile(&self, profile: &ShadowProfile) -> Result<User, UserError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, external_id, email, name, role) \
             VALUES ($1, $2, $3, $4, COALESCE($5, $6)) \
             ON CONFLICT (external_id) DO UPDATE SET \
               email = COALESCE(EXCLUDED.email, users.email), \
               name = COALESCE(EXCLUDED.name, users.name), \
               role = COALESCE($5, users.role), \
               updated_at = now() \
             RETURNING id, external_id, email, name, role, active, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&profile.external_id)
        .bind(&profile.email)
        .bind(&profile.name)
        .bind(&profile.role)
        .bind(DEFAULT_ROLE)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_user(row))
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, external_id, email, name, role, active, created_at, updated_at \
             FROM users WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_user))
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<String, User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a user's active flag. Test hook for deactivation paths.
    pub fn set_active(&self, external_id: &str, active: bool) {
        if let Some(mut user) = self.users.get_mut(external_id) {
            user.active = active;
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn upsert_from_profile(&self, profile: &ShadowProfile) -> Result<User, UserError> {
        let now = Utc::now();
        let mut entry = self
            .users
            .entry(profile.external_id.clone())
            .or_insert_with(|| User {
                id: Uuid::new_v4(),
                external_id: profile.external_id.clone(),
                email: None,
                name: None,
                role: DEFAULT_ROLE.to_string(),
                active: true,
                created_at: now,
                updated_at: now,
            });
        if let Some(email) = &profile.email {
            entry.email = Some(email.clone());
        }
        if let Some(name) = &profile.name {
            entry.name = Some(name.clone());
        }
        if let Some(role) = &profile.role {
            entry.role = role.clone();
        }
        entry.updated_at = now;
        Ok(entry.clone())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, UserError> {
        Ok(self.users.get(external_id).map(|u| u.clone()))
    }
}
