//! Read / decide / compare-and-set settlement of metered disclosures.
//!
//! The only concurrency primitive is [`LedgerStore::compare_and_set_balance`]:
//! a write that lands only if the stored balance still equals the snapshot
//! the decision was made on. Among concurrent settlements that read the same
//! snapshot exactly one write matches; the rest fail with
//! [`SettlementError::ConcurrencyConflict`] and are never retried here, since
//! a retry needs a fresh read and a fresh affordability decision that belong
//! to the caller.

use std::{sync::Arc, time::Duration};

use metrics::counter;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::model::{ContactDetails, ProviderId};
use crate::storage::{LedgerStore, StorageError};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub provider_id: ProviderId,
    pub charged: i64,
    pub previous_balance: i64,
    pub new_balance: i64,
    pub contacts: ContactDetails,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("provider not found")]
    NotFound,
    #[error("insufficient balance: {balance} available, {cost} required")]
    InsufficientBalance { balance: i64, cost: i64 },
    #[error("balance changed concurrently, no charge applied")]
    ConcurrencyConflict,
    #[error("settlement cost must be positive, got {0}")]
    InvalidCost(i64),
    #[error("ledger {stage} timed out")]
    Timeout { stage: &'static str },
    /// The conditional write was issued but not acknowledged in time; the
    /// charge may or may not have landed.
    #[error("ledger write outcome unknown (expected balance {expected_balance})")]
    OutcomeUnknown { expected_balance: i64 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SettlementError {
    fn label(&self) -> &'static str {
        match self {
            SettlementError::NotFound => "not_found",
            SettlementError::InsufficientBalance { .. } => "insufficient_balance",
            SettlementError::ConcurrencyConflict => "conflict",
            SettlementError::InvalidCost(_) => "invalid_cost",
            SettlementError::Timeout { .. } => "timeout",
            SettlementError::OutcomeUnknown { .. } => "outcome_unknown",
            SettlementError::Storage(_) => "storage_error",
        }
    }
}

#[derive(Clone)]
pub struct BalanceSettlementEngine {
    ledger: Arc<dyn LedgerStore>,
    store_timeout: Duration,
}

impl BalanceSettlementEngine {
    pub fn new(ledger: Arc<dyn LedgerStore>, store_timeout: Duration) -> Self {
        Self {
            ledger,
            store_timeout,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    pub async fn settle(
        &self,
        provider_id: &ProviderId,
        cost: i64,
    ) -> Result<Settlement, SettlementError> {
        let result = self.try_settle(provider_id, cost).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.label(),
        };
        counter!("ledger_settlements_total", "outcome" => outcome).increment(1);
        result
    }

    async fn try_settle(
        &self,
        provider_id: &ProviderId,
        cost: i64,
    ) -> Result<Settlement, SettlementError> {
        if cost <= 0 {
            return Err(SettlementError::InvalidCost(cost));
        }

        let record = timeout(self.store_timeout, self.ledger.find_provider(provider_id))
            .await
            .map_err(|_| SettlementError::Timeout { stage: "read" })??
            .ok_or(SettlementError::NotFound)?;

        let snapshot = record.balance;
        if snapshot < cost {
            return Err(SettlementError::InsufficientBalance {
                balance: snapshot,
                cost,
            });
        }

        let new_balance = snapshot - cost;
        let applied = match timeout(
            self.store_timeout,
            self.ledger
                .compare_and_set_balance(provider_id, snapshot, new_balance),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    provider = %provider_id,
                    expected_balance = new_balance,
                    "ledger write timed out, outcome unknown"
                );
                return Err(SettlementError::OutcomeUnknown {
                    expected_balance: new_balance,
                });
            }
        };

        if !applied {
            debug!(provider = %provider_id, snapshot, "lost compare-and-set race");
            return Err(SettlementError::ConcurrencyConflict);
        }

        Ok(Settlement {
            provider_id: record.id,
            charged: cost,
            previous_balance: snapshot,
            new_balance,
            contacts: record.contacts,
        })
    }
}
