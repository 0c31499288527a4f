use std::str::FromStr;

use chrono::NaiveDate;
use fixit_domain::model::{DailyMetric, DailyStat, NewAuditEntry};
use fixit_domain::storage::{AuditStore, StatsStore, StorageError, StorageResult};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{EntityTrait, QueryOrder, QuerySelect, Set};

use crate::entity::{admin_logs, daily_stats};
use crate::SeaOrmStorage;

const DAY_FORMAT: &str = "%Y-%m-%d";

#[async_trait::async_trait]
impl StatsStore for SeaOrmStorage {
    async fn increment_daily(&self, day: NaiveDate, metric: DailyMetric) -> StorageResult<()> {
        let model = daily_stats::ActiveModel {
            day: Set(day.format(DAY_FORMAT).to_string()),
            metric: Set(metric.as_ref().to_string()),
            count: Set(1),
        };
        daily_stats::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([daily_stats::Column::Day, daily_stats::Column::Metric])
                    .value(
                        daily_stats::Column::Count,
                        Expr::col((daily_stats::Entity, daily_stats::Column::Count)).add(1),
                    )
                    .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(())
    }

    async fn recent_daily_stats(&self, limit: u64) -> StorageResult<Vec<DailyStat>> {
        let rows = daily_stats::Entity::find()
            .order_by_desc(daily_stats::Column::Day)
            .order_by_asc(daily_stats::Column::Metric)
            .limit(limit)
            .all(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        rows.into_iter().map(stat_from_model).collect()
    }
}

#[async_trait::async_trait]
impl AuditStore for SeaOrmStorage {
    async fn append_audit(&self, entry: NewAuditEntry) -> StorageResult<()> {
        let model = admin_logs::ActiveModel {
            action: Set(entry.action.as_ref().to_string()),
            details: Set(entry.details.to_string()),
            actor_ip: Set(entry.actor_ip),
            created_at: Set(entry.recorded_at),
            ..Default::default()
        };
        admin_logs::Entity::insert(model)
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(())
    }
}

fn stat_from_model(model: daily_stats::Model) -> StorageResult<DailyStat> {
    let day = NaiveDate::parse_from_str(&model.day, DAY_FORMAT)
        .map_err(|err| StorageError::Corrupt(format!("daily stat day `{}`: {err}", model.day)))?;
    let metric = DailyMetric::from_str(&model.metric)
        .map_err(|_| StorageError::Corrupt(format!("unknown daily metric `{}`", model.metric)))?;
    Ok(DailyStat {
        day,
        metric,
        count: model.count,
    })
}
