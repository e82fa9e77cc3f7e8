//! Credit admission control.
//!
//! Every billable operation passes through the gate before any
//! upstream work happens: read the balance, compare against the fixed
//! cost, deduct. The whole sequence runs under a short timeout and
//! fails closed — an unreachable ledger denies, it never lets work
//! through unbilled. Deducted credit is not refunded when the
//! downstream operation fails; the failure shows up as a failed
//! transaction log entry instead.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use crate::clients::ledger::{CreditLedger, LedgerError};
use crate::models::auth::Principal;

/// Default bound on the balance + deduct sequence.
pub const DEFAULT_ADMISSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Credit gate errors.
#[derive(Debug, Error)]
pub enum CreditError {
    #[error("Insufficient credits: balance {balance}, cost {cost}")]
    Insufficient { balance: i64, cost: i64 },

    #[error("Credit check unavailable: {0}")]
    Unavailable(String),
}

/// Operations that cost credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillableOperation {
    Prediction,
}

impl BillableOperation {
    pub fn reason(&self) -> &'static str {
        match self {
            BillableOperation::Prediction => "flow prediction",
        }
    }
}

/// Fixed per-operation costs.
#[derive(Debug, Clone)]
pub struct OperationCosts {
    pub prediction: i64,
}

impl Default for OperationCosts {
    fn default() -> Self {
        Self { prediction: 1 }
    }
}

impl OperationCosts {
    fn cost_of(&self, op: BillableOperation) -> i64 {
        match op {
            BillableOperation::Prediction => self.prediction,
        }
    }
}

/// Proof that the gate admitted an operation; carries the cost so the
/// eventual transaction log entry matches what was deducted.
#[derive(Debug, Clone, Copy)]
pub struct Admission {
    pub cost: i64,
}

/// Admission control for billable operations.
pub struct CreditGate {
    ledger: Arc<dyn CreditLedger>,
    costs: OperationCosts,
    admission_timeout: Duration,
}

impl CreditGate {
    pub fn new(
        ledger: Arc<dyn CreditLedger>,
        costs: OperationCosts,
        admission_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            costs,
            admission_timeout,
        }
    }

    /// Check the balance and deduct the operation's cost. Only a
    /// successful deduct yields an [`Admission`].
    pub async fn check_and_deduct(
        &self,
        principal: &Principal,
        op: BillableOperation,
    ) -> Result<Admission, CreditError> {
        let cost = self.costs.cost_of(op);
        let admission = async {
            let balance = self.ledger.get_balance(&principal.token).await?;
            if balance < cost {
                return Err(CreditError::Insufficient { balance, cost });
            }
            self.ledger.deduct(&principal.token, cost, op.reason()).await?;
            debug!(user_id = %principal.user_id, cost, balance, "credits deducted");
            Ok(Admission { cost })
        };
        timeout(self.admission_timeout, admission)
            .await
            .map_err(|_| CreditError::Unavailable("admission check timed out".into()))?
    }
}

impl From<LedgerError> for CreditError {
    fn from(e: LedgerError) -> Self {
        CreditError::Unavailable(e.to_string())
    }
}
