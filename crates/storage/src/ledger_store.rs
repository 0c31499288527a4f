use chrono::Utc;
use fixit_domain::model::{
    ContactDetails, NewProvider, ProviderId, ProviderOverview, ProviderRecord, ProviderSource,
};
use fixit_domain::storage::{LedgerStore, ProviderStore, StorageError, StorageResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect, Set,
};

use crate::entity::providers::{self, ProviderSourceDb};
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl LedgerStore for SeaOrmStorage {
    async fn find_provider(&self, id: &ProviderId) -> StorageResult<Option<ProviderRecord>> {
        let maybe = providers::Entity::find_by_id(id.as_str().to_owned())
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        maybe.map(provider_to_record).transpose()
    }

    async fn compare_and_set_balance(
        &self,
        id: &ProviderId,
        expected: i64,
        new_balance: i64,
    ) -> StorageResult<bool> {
        if new_balance < 0 {
            return Err(StorageError::Database(format!(
                "refusing negative balance {new_balance} for provider {id}"
            )));
        }

        let result = providers::Entity::update_many()
            .col_expr(providers::Column::Balance, Expr::value(new_balance))
            .filter(providers::Column::Id.eq(id.as_str()))
            .filter(providers::Column::Balance.eq(expected))
            .exec(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(result.rows_affected == 1)
    }
}

#[async_trait::async_trait]
impl ProviderStore for SeaOrmStorage {
    async fn insert_provider(&self, provider: NewProvider) -> StorageResult<ProviderRecord> {
        if provider.balance < 0 {
            return Err(StorageError::Database(format!(
                "provider {} cannot start with a negative balance",
                provider.id
            )));
        }
        let contacts = serde_json::to_string(&provider.contacts)
            .map_err(|err| StorageError::Corrupt(err.to_string()))?;

        let model = providers::ActiveModel {
            id: Set(provider.id.into_inner()),
            name: Set(provider.name),
            source: Set(provider.source.into()),
            balance: Set(provider.balance),
            contacts: Set(contacts),
            verified: Set(false),
            is_premium: Set(false),
            created_at: Set(Utc::now()),
        };
        let created = model
            .insert(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        provider_to_record(created)
    }

    async fn provider_overview(&self) -> StorageResult<ProviderOverview> {
        let total = providers::Entity::find()
            .count(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        let metered = providers::Entity::find()
            .filter(providers::Column::Source.eq(ProviderSourceDb::UserSubmitted))
            .count(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        let premium = providers::Entity::find()
            .filter(providers::Column::IsPremium.eq(true))
            .count(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        // Summed here rather than with SUM() so both backends yield an i64.
        let balances: Vec<i64> = providers::Entity::find()
            .select_only()
            .column(providers::Column::Balance)
            .filter(providers::Column::Balance.gt(0))
            .into_tuple()
            .all(self.connection())
            .await
            .map_err(StorageError::from_source)?;

        Ok(ProviderOverview {
            total,
            metered,
            premium,
            total_balance: balances.into_iter().sum(),
        })
    }

    async fn verify_provider(&self, id: &ProviderId, is_premium: bool) -> StorageResult<bool> {
        let result = providers::Entity::update_many()
            .col_expr(providers::Column::Verified, Expr::value(true))
            .col_expr(providers::Column::IsPremium, Expr::value(is_premium))
            .filter(providers::Column::Id.eq(id.as_str()))
            .exec(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(result.rows_affected > 0)
    }
}

impl From<ProviderSource> for ProviderSourceDb {
    fn from(value: ProviderSource) -> Self {
        match value {
            ProviderSource::DirectoryImport => ProviderSourceDb::DirectoryImport,
            ProviderSource::UserSubmitted => ProviderSourceDb::UserSubmitted,
        }
    }
}

impl From<ProviderSourceDb> for ProviderSource {
    fn from(value: ProviderSourceDb) -> Self {
        match value {
            ProviderSourceDb::DirectoryImport => ProviderSource::DirectoryImport,
            ProviderSourceDb::UserSubmitted => ProviderSource::UserSubmitted,
        }
    }
}

fn provider_to_record(model: providers::Model) -> StorageResult<ProviderRecord> {
    let contacts: ContactDetails = serde_json::from_str(&model.contacts).map_err(|err| {
        StorageError::Corrupt(format!("contacts of provider {}: {err}", model.id))
    })?;

    Ok(ProviderRecord {
        id: ProviderId::new(model.id),
        name: model.name,
        source: model.source.into(),
        balance: model.balance,
        contacts,
        verified: model.verified,
        is_premium: model.is_premium,
        created_at: model.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_storage;

    fn provider(id: &str, source: ProviderSource, balance: i64) -> NewProvider {
        NewProvider {
            id: ProviderId::from(id),
            name: format!("Workshop {id}"),
            source,
            balance,
            contacts: ContactDetails {
                phone: Some("+1-555-0100".into()),
                email: None,
                website: Some("https://workshop.example".into()),
            },
        }
    }

    #[tokio::test]
    async fn insert_then_find_round_trips_contacts() {
        let storage = memory_storage().await;
        storage
            .insert_provider(provider("p1", ProviderSource::UserSubmitted, 15))
            .await
            .unwrap();

        let found = storage
            .find_provider(&ProviderId::from("p1"))
            .await
            .unwrap()
            .expect("provider exists");
        assert_eq!(found.source, ProviderSource::UserSubmitted);
        assert_eq!(found.balance, 15);
        assert_eq!(found.contacts.phone.as_deref(), Some("+1-555-0100"));
        assert_eq!(found.contacts.email, None);

        assert!(storage
            .find_provider(&ProviderId::from("ghost"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn compare_and_set_only_applies_on_expected_balance() {
        let storage = memory_storage().await;
        storage
            .insert_provider(provider("p2", ProviderSource::UserSubmitted, 15))
            .await
            .unwrap();
        let id = ProviderId::from("p2");

        assert!(storage.compare_and_set_balance(&id, 15, 5).await.unwrap());
        // The same expectation is now stale.
        assert!(!storage.compare_and_set_balance(&id, 15, 5).await.unwrap());
        assert!(!storage
            .compare_and_set_balance(&ProviderId::from("ghost"), 0, 0)
            .await
            .unwrap());

        let balance = storage.find_provider(&id).await.unwrap().unwrap().balance;
        assert_eq!(balance, 5);
    }

    #[tokio::test]
    async fn negative_balances_are_rejected() {
        let storage = memory_storage().await;
        storage
            .insert_provider(provider("p3", ProviderSource::UserSubmitted, 5))
            .await
            .unwrap();

        let err = storage
            .compare_and_set_balance(&ProviderId::from("p3"), 5, -5)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Database(_)));
        assert!(storage
            .insert_provider(provider("p4", ProviderSource::UserSubmitted, -1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn overview_counts_metered_providers_and_balance() {
        let storage = memory_storage().await;
        for (id, source, balance) in [
            ("a", ProviderSource::DirectoryImport, 0),
            ("b", ProviderSource::UserSubmitted, 15),
            ("c", ProviderSource::UserSubmitted, 5),
        ] {
            storage
                .insert_provider(provider(id, source, balance))
                .await
                .unwrap();
        }

        let overview = storage.provider_overview().await.unwrap();
        assert_eq!(
            overview,
            ProviderOverview {
                total: 3,
                metered: 2,
                premium: 0,
                total_balance: 20,
            }
        );
    }

    #[tokio::test]
    async fn verify_sets_flags_and_counts_premium() {
        let storage = memory_storage().await;
        storage
            .insert_provider(provider("v1", ProviderSource::UserSubmitted, 0))
            .await
            .unwrap();
        let id = ProviderId::from("v1");

        let fresh = storage.find_provider(&id).await.unwrap().unwrap();
        assert!(!fresh.verified);
        assert!(!fresh.is_premium);

        assert!(storage.verify_provider(&id, true).await.unwrap());
        let verified = storage.find_provider(&id).await.unwrap().unwrap();
        assert!(verified.verified);
        assert!(verified.is_premium);
        assert_eq!(storage.provider_overview().await.unwrap().premium, 1);

        // Re-verifying can drop the premium flag.
        assert!(storage.verify_provider(&id, false).await.unwrap());
        assert_eq!(storage.provider_overview().await.unwrap().premium, 0);

        assert!(!storage
            .verify_provider(&ProviderId::from("ghost"), true)
            .await
            .unwrap());
    }
}
