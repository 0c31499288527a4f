//! Process-wide read-through cache of the admin-editable `app_config` table.
//!
//! Snapshots are whole-table: a refresh replaces every entry at once. The
//! moka cache is keyed by an invalidation generation, so `invalidate()` bumps
//! the generation and the next read misses unconditionally, even if a refresh
//! that started before the invalidation is still in flight. moka's
//! `try_get_with` collapses concurrent misses on one generation into a single
//! fetch, and its time-to-live bounds staleness when nobody invalidates.
//!
//! The moka cache is unbounded on purpose: a size bound would put retired
//! generations in competition with the live one for admission.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use metrics::counter;
use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::storage::{ConfigStore, StorageError};

pub const DEFAULT_CONFIG_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    entries: HashMap<String, String>,
    refreshed_at: DateTime<Utc>,
    generation: u64,
}

impl ConfigSnapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigCacheError {
    #[error("config refresh failed: {0}")]
    Refresh(StorageError),
}

pub struct ConfigCache {
    store: Arc<dyn ConfigStore>,
    snapshots: Cache<u64, Arc<ConfigSnapshot>>,
    generation: AtomicU64,
    last_good: RwLock<Option<Arc<ConfigSnapshot>>>,
    ttl: Duration,
}

impl ConfigCache {
    pub fn new(store: Arc<dyn ConfigStore>, ttl: Duration) -> Self {
        Self {
            store,
            snapshots: Cache::builder().time_to_live(ttl).build(),
            generation: AtomicU64::new(0),
            last_good: RwLock::new(None),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, ConfigCacheError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.get(key).map(str::to_owned))
    }

    /// Returns the current snapshot, refreshing first when the cache was never
    /// loaded, has outlived its TTL, or was invalidated. When the refresh
    /// fails but an older snapshot exists, the older snapshot is served.
    pub async fn snapshot(&self) -> Result<Arc<ConfigSnapshot>, ConfigCacheError> {
        let generation = self.generation.load(Ordering::Acquire);
        match self
            .snapshots
            .try_get_with(generation, self.load(generation))
            .await
        {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                counter!("config_cache_refresh_total", "result" => "error").increment(1);
                let err = StorageError::clone(&err);
                match self.last_good() {
                    Some(stale) => {
                        warn!(
                            error = %err,
                            refreshed_at = %stale.refreshed_at(),
                            "config refresh failed, serving stale snapshot"
                        );
                        Ok(stale)
                    }
                    None => Err(ConfigCacheError::Refresh(err)),
                }
            }
        }
    }

    /// Forces the next read to refetch regardless of TTL. Retired
    /// generations are dropped; a refresh still in flight for one of them
    /// lands under its own key and is never read again.
    pub fn invalidate(&self) {
        let previous = self.generation.fetch_add(1, Ordering::AcqRel);
        self.snapshots.invalidate_all();
        counter!("config_cache_invalidations_total").increment(1);
        info!(generation = previous + 1, "config cache invalidated");
    }

    pub async fn refresh(&self) -> Result<Arc<ConfigSnapshot>, ConfigCacheError> {
        self.invalidate();
        self.snapshot().await
    }

    pub fn last_refresh_at(&self) -> Option<DateTime<Utc>> {
        self.last_good().map(|snapshot| snapshot.refreshed_at())
    }

    async fn load(&self, generation: u64) -> Result<Arc<ConfigSnapshot>, StorageError> {
        let rows = self.store.list_config().await?;
        let snapshot = Arc::new(ConfigSnapshot {
            entries: rows.into_iter().map(|row| (row.key, row.value)).collect(),
            refreshed_at: Utc::now(),
            generation,
        });
        counter!("config_cache_refresh_total", "result" => "ok").increment(1);
        if snapshot.is_empty() {
            debug!(generation, "app_config is empty, built-in defaults apply");
        } else {
            info!(entries = snapshot.len(), generation, "refreshed app config");
        }
        self.remember(&snapshot);
        Ok(snapshot)
    }

    fn remember(&self, snapshot: &Arc<ConfigSnapshot>) {
        let mut guard = self
            .last_good
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let newer = guard
            .as_ref()
            .map_or(true, |current| current.generation() <= snapshot.generation());
        if newer {
            *guard = Some(snapshot.clone());
        }
    }

    fn last_good(&self) -> Option<Arc<ConfigSnapshot>> {
        self.last_good
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
