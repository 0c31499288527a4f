use std::sync::Arc;

use serde_json::json;
use tokio::time::timeout;
use tracing::info;

use crate::model::{AuditAction, ContactDetails, DailyMetric, NewAuditEntry, ProviderId};
use crate::services::policy::{classify, DisclosureTerms};
use crate::services::settlement::{BalanceSettlementEngine, SettlementError};
use crate::services::sink::StatsSink;

/// Contacts handed to the requester plus what it cost the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disclosure {
    pub provider_id: ProviderId,
    pub contacts: ContactDetails,
    pub terms: DisclosureTerms,
    /// Balance left after the charge; `None` for free disclosures.
    pub remaining_balance: Option<i64>,
}

/// Public reveal operation: classify, settle when metered, then fire the
/// lead counter (and an audit entry for charged reveals) without waiting.
#[derive(Clone)]
pub struct ContactDisclosureService {
    settlement: BalanceSettlementEngine,
    sink: StatsSink,
}

impl ContactDisclosureService {
    pub fn new(settlement: BalanceSettlementEngine, sink: StatsSink) -> Self {
        Self { settlement, sink }
    }

    /// Failures are returned exactly as the settlement engine reported them;
    /// nothing is retried and no side effect fires on failure.
    pub async fn reveal(
        &self,
        provider_id: &ProviderId,
        actor_ip: Option<&str>,
    ) -> Result<Disclosure, SettlementError> {
        let record = timeout(
            self.settlement.store_timeout(),
            self.settlement.ledger().find_provider(provider_id),
        )
        .await
        .map_err(|_| SettlementError::Timeout { stage: "read" })??
        .ok_or(SettlementError::NotFound)?;

        let terms = classify(record.source);
        let disclosure = match terms {
            DisclosureTerms::Free => Disclosure {
                provider_id: record.id,
                contacts: record.contacts,
                terms,
                remaining_balance: None,
            },
            DisclosureTerms::Metered { cost } => {
                let settlement = self.settlement.settle(provider_id, cost).await?;
                info!(
                    provider = %provider_id,
                    cost,
                    balance = settlement.new_balance,
                    "metered contact disclosed"
                );
                self.sink.audit(NewAuditEntry::now(
                    AuditAction::RevealContact,
                    json!({
                        "provider_id": provider_id.as_str(),
                        "cost": cost,
                        "balance": settlement.new_balance,
                    }),
                    actor_ip.map(str::to_owned),
                ));
                Disclosure {
                    provider_id: settlement.provider_id,
                    contacts: settlement.contacts,
                    terms,
                    remaining_balance: Some(settlement.new_balance),
                }
            }
        };

        self.sink.increment(DailyMetric::Leads);
        Ok(disclosure)
    }
}
