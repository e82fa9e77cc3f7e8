//! Billing domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal outcome of a billable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failed,
}

/// Payload of a `log_transaction` call to the credit ledger.
///
/// Every terminal state of a billable operation produces exactly one
/// of these, success or failure alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    pub flow_id: String,
    pub session_id: String,
    pub cost: i64,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(
        user_id: &str,
        flow_id: &str,
        session_id: &str,
        cost: i64,
        status: TransactionStatus,
        detail: Option<String>,
    ) -> Self {
        Self {
            id: crate::id::uuidv7().to_string(),
            user_id: user_id.to_string(),
            flow_id: flow_id.to_string(),
            session_id: session_id.to_string(),
            cost,
            status,
            detail,
            created_at: Utc::now(),
        }
    }
}
