//! In-memory store double shared by the service tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::{sync::Barrier, time::sleep};

use crate::model::{
    ConfigEntry, ContactDetails, DailyMetric, DailyStat, NewAuditEntry, NewConfigEntry,
    NewProvider, ProviderId, ProviderOverview, ProviderRecord, ProviderSource,
};
use crate::storage::{
    AuditStore, ConfigStore, LedgerStore, ProviderStore, StatsStore, StorageError, StorageResult,
};

#[derive(Default)]
pub(crate) struct MemoryStore {
    providers: Mutex<HashMap<ProviderId, ProviderRecord>>,
    config: Mutex<Vec<ConfigEntry>>,
    stats: Mutex<HashMap<(NaiveDate, DailyMetric), i64>>,
    audits: Mutex<Vec<NewAuditEntry>>,
    pub(crate) read_barrier: Mutex<Option<Arc<Barrier>>>,
    pub(crate) read_delay: Mutex<Option<Duration>>,
    pub(crate) write_delay: Mutex<Option<Duration>>,
    pub(crate) config_delay: Mutex<Option<Duration>>,
    pub(crate) fail_config: AtomicBool,
    pub(crate) fail_side_effects: AtomicBool,
    pub(crate) ledger_writes: AtomicUsize,
    pub(crate) config_reads: AtomicUsize,
}

impl MemoryStore {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn put_provider(&self, id: &str, source: ProviderSource, balance: i64) {
        let record = ProviderRecord {
            id: ProviderId::from(id),
            name: format!("provider {id}"),
            source,
            balance,
            contacts: ContactDetails {
                phone: Some(format!("+1-555-{id}")),
                ..Default::default()
            },
            verified: false,
            is_premium: false,
            created_at: Utc::now(),
        };
        self.providers
            .lock()
            .unwrap()
            .insert(record.id.clone(), record);
    }

    pub(crate) fn balance(&self, id: &str) -> Option<i64> {
        self.providers
            .lock()
            .unwrap()
            .get(&ProviderId::from(id))
            .map(|record| record.balance)
    }

    pub(crate) fn put_config(&self, key: &str, value: &str) {
        let mut config = self.config.lock().unwrap();
        config.retain(|entry| entry.key != key);
        config.push(ConfigEntry {
            key: key.to_string(),
            value: value.to_string(),
            description: None,
            updated_at: Utc::now(),
        });
    }

    pub(crate) fn stat(&self, metric: DailyMetric) -> i64 {
        self.stats
            .lock()
            .unwrap()
            .iter()
            .filter(|((_, m), _)| *m == metric)
            .map(|(_, count)| *count)
            .sum()
    }

    pub(crate) fn audits(&self) -> Vec<NewAuditEntry> {
        self.audits.lock().unwrap().clone()
    }

    fn side_effect_guard(&self) -> StorageResult<()> {
        if self.fail_side_effects.load(Ordering::SeqCst) {
            Err(StorageError::Database("side-effect store offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn find_provider(&self, id: &ProviderId) -> StorageResult<Option<ProviderRecord>> {
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        let snapshot = self.providers.lock().unwrap().get(id).cloned();
        let barrier = self.read_barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        Ok(snapshot)
    }

    async fn compare_and_set_balance(
        &self,
        id: &ProviderId,
        expected: i64,
        new_balance: i64,
    ) -> StorageResult<bool> {
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        self.ledger_writes.fetch_add(1, Ordering::SeqCst);
        let mut providers = self.providers.lock().unwrap();
        match providers.get_mut(id) {
            Some(record) if record.balance == expected => {
                record.balance = new_balance;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ProviderStore for MemoryStore {
    async fn insert_provider(&self, provider: NewProvider) -> StorageResult<ProviderRecord> {
        let record = ProviderRecord {
            id: provider.id,
            name: provider.name,
            source: provider.source,
            balance: provider.balance,
            contacts: provider.contacts,
            verified: false,
            is_premium: false,
            created_at: Utc::now(),
        };
        self.providers
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn provider_overview(&self) -> StorageResult<ProviderOverview> {
        let providers = self.providers.lock().unwrap();
        Ok(ProviderOverview {
            total: providers.len() as u64,
            metered: providers
                .values()
                .filter(|p| p.source == ProviderSource::UserSubmitted)
                .count() as u64,
            premium: providers.values().filter(|p| p.is_premium).count() as u64,
            total_balance: providers.values().map(|p| p.balance).sum(),
        })
    }

    async fn verify_provider(&self, id: &ProviderId, is_premium: bool) -> StorageResult<bool> {
        match self.providers.lock().unwrap().get_mut(id) {
            Some(record) => {
                record.verified = true;
                record.is_premium = is_premium;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn list_config(&self) -> StorageResult<Vec<ConfigEntry>> {
        self.config_reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.config_delay.lock().unwrap();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        if self.fail_config.load(Ordering::SeqCst) {
            return Err(StorageError::Database("config table unavailable".into()));
        }
        Ok(self.config.lock().unwrap().clone())
    }

    async fn upsert_config(&self, entry: NewConfigEntry) -> StorageResult<ConfigEntry> {
        self.put_config(&entry.key, &entry.value);
        Ok(ConfigEntry {
            key: entry.key,
            value: entry.value,
            description: entry.description,
            updated_at: entry.updated_at,
        })
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn increment_daily(&self, day: NaiveDate, metric: DailyMetric) -> StorageResult<()> {
        self.side_effect_guard()?;
        *self.stats.lock().unwrap().entry((day, metric)).or_insert(0) += 1;
        Ok(())
    }

    async fn recent_daily_stats(&self, limit: u64) -> StorageResult<Vec<DailyStat>> {
        let mut rows: Vec<DailyStat> = self
            .stats
            .lock()
            .unwrap()
            .iter()
            .map(|((day, metric), count)| DailyStat {
                day: *day,
                metric: *metric,
                count: *count,
            })
            .collect();
        rows.sort_by(|a, b| b.day.cmp(&a.day));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit(&self, entry: NewAuditEntry) -> StorageResult<()> {
        self.side_effect_guard()?;
        self.audits.lock().unwrap().push(entry);
        Ok(())
    }
}
