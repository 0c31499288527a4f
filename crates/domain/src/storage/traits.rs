use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{
    ConfigEntry, DailyMetric, DailyStat, NewAuditEntry, NewConfigEntry, NewProvider, ProviderId,
    ProviderOverview, ProviderRecord,
};

/// Common result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StorageError {
    pub fn from_source(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}

/// Point read and compare-and-set on a provider's balance. The backing store
/// is not assumed to offer transactions or relative updates.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_provider(&self, id: &ProviderId) -> StorageResult<Option<ProviderRecord>>;

    /// Sets `balance = new_balance` only if the stored balance still equals
    /// `expected`. Returns `false` when no row matched.
    async fn compare_and_set_balance(
        &self,
        id: &ProviderId,
        expected: i64,
        new_balance: i64,
    ) -> StorageResult<bool>;
}

/// Catalog boundary used by import jobs and the admin dashboard.
#[async_trait]
pub trait ProviderStore: Send + Sync {
    async fn insert_provider(&self, provider: NewProvider) -> StorageResult<ProviderRecord>;
    async fn provider_overview(&self) -> StorageResult<ProviderOverview>;

    /// Marks the provider as verified and sets its premium flag. Returns
    /// `false` when no provider has that id.
    async fn verify_provider(&self, id: &ProviderId, is_premium: bool) -> StorageResult<bool>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn list_config(&self) -> StorageResult<Vec<ConfigEntry>>;
    async fn upsert_config(&self, entry: NewConfigEntry) -> StorageResult<ConfigEntry>;
}

#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn increment_daily(&self, day: NaiveDate, metric: DailyMetric) -> StorageResult<()>;
    /// Newest rows first.
    async fn recent_daily_stats(&self, limit: u64) -> StorageResult<Vec<DailyStat>>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, entry: NewAuditEntry) -> StorageResult<()>;
}
