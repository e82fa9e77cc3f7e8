//! Credit ledger client.
//!
//! The ledger owns balances and accounting rules. Calls are made
//! on-behalf-of the end user with the principal's own bearer token;
//! the gateway never keeps a local copy of a balance.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::models::billing::TransactionRecord;

/// Ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger rejected the call: {0}")]
    Rejected(String),

    #[error("Ledger protocol error: {0}")]
    Protocol(String),
}

/// External credit ledger.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Current balance of the calling user.
    async fn get_balance(&self, token: &str) -> Result<i64, LedgerError>;

    /// Deduct `amount` credits from the calling user.
    async fn deduct(&self, token: &str, amount: i64, reason: &str) -> Result<(), LedgerError>;

    /// Record the terminal state of a billable operation.
    async fn log_transaction(&self, record: &TransactionRecord) -> Result<(), LedgerError>;
}

/// HTTP ledger client.
pub struct HttpCreditLedger {
    base_url: Url,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: i64,
}

#[derive(Serialize)]
struct DeductBody<'a> {
    amount: i64,
    reason: &'a str,
}

impl HttpCreditLedger {
    pub fn new(base_url: Url, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }

    fn endpoint(&self, path: &str) -> Result<Url, LedgerError> {
        self.base_url
            .join(path)
            .map_err(|e| LedgerError::Protocol(format!("bad endpoint {path}: {e}")))
    }
}

#[async_trait]
impl CreditLedger for HttpCreditLedger {
    async fn get_balance(&self, token: &str) -> Result<i64, LedgerError> {
        let response = self
            .client
            .get(self.endpoint("balance")?)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(LedgerError::Rejected(format!(
                "balance returned status {}",
                response.status()
            )));
        }
        response
            .json::<BalanceResponse>()
            .await
            .map(|b| b.balance)
            .map_err(|e| LedgerError::Protocol(format!("balance response: {e}")))
    }

    async fn deduct(&self, token: &str, amount: i64, reason: &str) -> Result<(), LedgerError> {
        let response = self
            .client
            .post(self.endpoint("deduct")?)
            .bearer_auth(token)
            .json(&DeductBody { amount, reason })
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(LedgerError::Rejected(format!(
                "deduct returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn log_transaction(&self, record: &TransactionRecord) -> Result<(), LedgerError> {
        let response = self
            .client
            .post(self.endpoint("transactions")?)
            .json(record)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(LedgerError::Rejected(format!(
                "transaction log returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
