//! SeaORM-backed storage adapters that satisfy the domain storage traits while
//! keeping the database backend swappable (SQLite by default, PostgreSQL via
//! feature flag).

mod builder;
mod config_store;
mod entity;
mod ledger_store;
mod migration;
mod stats_store;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

pub use builder::StorageBuilder;

/// Shared storage handle used by the HTTP API and the side-effect sink.
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStorage {
    /// Entry point for connecting; the builder also ensures the schema is
    /// present.
    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    pub(crate) fn from_connection(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }
}

#[cfg(test)]
pub(crate) async fn memory_storage() -> SeaOrmStorage {
    SeaOrmStorage::builder()
        .database_url("sqlite::memory:")
        .max_connections(Some(1))
        .build()
        .await
        .expect("in-memory sqlite")
}
