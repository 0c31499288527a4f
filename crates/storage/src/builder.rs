use std::time::Duration;

use fixit_domain::storage::{StorageError, StorageResult};
use sea_orm::{ConnectOptions, ConnectionTrait, Database};
use tracing::info;

use crate::{migration::run_migrations, SeaOrmStorage};

#[derive(Default)]
pub struct StorageBuilder {
    database_url: Option<String>,
    max_connections: Option<u32>,
    connect_timeout: Option<Duration>,
}

impl StorageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn max_connections(mut self, max: Option<u32>) -> Self {
        self.max_connections = max;
        self
    }

    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub async fn build(self) -> StorageResult<SeaOrmStorage> {
        let url = self
            .database_url
            .ok_or_else(|| StorageError::Database("missing database url".into()))?;

        let mut options = ConnectOptions::new(url);
        // sqlx would log every balance read at `info`.
        options.sqlx_logging(false);
        if let Some(max) = self.max_connections {
            options.max_connections(max);
        }
        if let Some(timeout) = self.connect_timeout {
            options.connect_timeout(timeout);
        }

        let db = Database::connect(options)
            .await
            .map_err(StorageError::from_source)?;
        run_migrations(&db).await?;
        info!(backend = ?db.get_database_backend(), "storage ready");
        Ok(SeaOrmStorage::from_connection(db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_requires_database_url() {
        let err = StorageBuilder::new().build().await.err().expect("missing url");
        assert_eq!(err, StorageError::Database("missing database url".into()));
    }

    #[tokio::test]
    async fn build_runs_migrations_idempotently() {
        let storage = StorageBuilder::new()
            .database_url("sqlite::memory:")
            .max_connections(Some(1))
            .connect_timeout(Some(Duration::from_secs(5)))
            .build()
            .await
            .expect("storage");
        run_migrations(storage.connection())
            .await
            .expect("second migration run is a no-op");
    }
}
