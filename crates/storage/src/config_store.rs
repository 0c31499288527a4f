use fixit_domain::model::{ConfigEntry, NewConfigEntry};
use fixit_domain::storage::{ConfigStore, StorageError, StorageResult};
use sea_orm::sea_query::OnConflict;
use sea_orm::{EntityTrait, QueryOrder, Set};

use crate::entity::app_config;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl ConfigStore for SeaOrmStorage {
    async fn list_config(&self) -> StorageResult<Vec<ConfigEntry>> {
        let rows = app_config::Entity::find()
            .order_by_asc(app_config::Column::Key)
            .all(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(rows.into_iter().map(config_to_entry).collect())
    }

    async fn upsert_config(&self, entry: NewConfigEntry) -> StorageResult<ConfigEntry> {
        let model = app_config::ActiveModel {
            key: Set(entry.key.clone()),
            value: Set(entry.value.clone()),
            description: Set(entry.description.clone()),
            updated_at: Set(entry.updated_at),
        };
        app_config::Entity::insert(model)
            .on_conflict(
                OnConflict::column(app_config::Column::Key)
                    .update_columns([
                        app_config::Column::Value,
                        app_config::Column::Description,
                        app_config::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;

        Ok(ConfigEntry {
            key: entry.key,
            value: entry.value,
            description: entry.description,
            updated_at: entry.updated_at,
        })
    }
}

fn config_to_entry(model: app_config::Model) -> ConfigEntry {
    ConfigEntry {
        key: model.key,
        value: model.value,
        description: model.description,
        updated_at: model.updated_at,
    }
}
