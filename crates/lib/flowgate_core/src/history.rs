//! Chat message persistence.
//!
//! The relay stores one merged assistant message per response plus the
//! structured metadata trail, not the hundreds of token fragments the
//! stream delivered them in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use thiserror::Error;

use crate::id::uuidv7;

/// History errors.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A persisted assistant message.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub user_id: String,
    pub session_id: String,
    pub content: String,
    pub metadata: Vec<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Storage of completed assistant messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append_assistant_message(
        &self,
        user_id: &str,
        session_id: &str,
        content: &str,
        metadata: &[serde_json::Value],
    ) -> Result<(), HistoryError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL store
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append_assistant_message(
        &self,
        user_id: &str,
        session_id: &str,
        content: &str,
        metadata: &[serde_json::Value],
    ) -> Result<(), HistoryError> {
        sqlx::query(
            "INSERT INTO chat_messages (id, user_id, session_id, role, content, metadata) \
             VALUES ($1, $2, $3, 'assistant', $4, $5)",
        )
        .bind(uuidv7())
        .bind(user_id)
        .bind(session_id)
        .bind(content)
        .bind(serde_json::Value::Array(metadata.to_vec()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory store for tests and ephemeral deployments. Messages are
/// grouped by session id and readable back through [`session_messages`].
///
/// [`session_messages`]: MemoryMessageStore::session_messages
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: DashMap<String, Vec<StoredMessage>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_messages(&self, session_id: &str) -> Vec<StoredMessage> {
        self.messages
            .get(session_id)
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append_assistant_message(
        &self,
        user_id: &str,
        session_id: &str,
        content: &str,
        metadata: &[serde_json::Value],
    ) -> Result<(), HistoryError> {
        self.messages
            .entry(session_id.to_string())
            .or_default()
            .push(StoredMessage {
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                content: content.to_string(),
                metadata: metadata.to_vec(),
                created_at: Utc::now(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_accumulate_per_session() {
        let store = MemoryMessageStore::new();
        store
            .append_assistant_message("user-1", "session-a", "Hello", &[])
            .await
            .unwrap();
        store
            .append_assistant_message("user-1", "session-a", "Again", &[])
            .await
            .unwrap();
        store
            .append_assistant_message("user-2", "session-b", "Elsewhere", &[])
            .await
            .unwrap();

        let a = store.session_messages("session-a");
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].content, "Hello");
        assert_eq!(store.session_messages("session-b").len(), 1);
        assert!(store.session_messages("session-c").is_empty());
    }
}
