use sea_orm::sea_query::{ColumnDef, Expr, Index, Table, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection};

use crate::entity::{admin_logs, app_config, daily_stats, providers};
use fixit_domain::storage::{StorageError, StorageResult};

/// Idempotent schema bootstrap; every statement is `CREATE TABLE IF NOT EXISTS`.
pub async fn run_migrations(db: &DatabaseConnection) -> StorageResult<()> {
    let backend = db.get_database_backend();

    let providers_table = Table::create()
        .table(providers::Entity)
        .col(
            ColumnDef::new(providers::Column::Id)
                .string_len(128)
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(providers::Column::Name).string().not_null())
        .col(
            ColumnDef::new(providers::Column::Source)
                .small_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(providers::Column::Balance)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(ColumnDef::new(providers::Column::Contacts).text().not_null())
        .col(
            ColumnDef::new(providers::Column::Verified)
                .boolean()
                .not_null()
                .default(false),
        )
        .col(
            ColumnDef::new(providers::Column::IsPremium)
                .boolean()
                .not_null()
                .default(false),
        )
        .col(
            ColumnDef::new(providers::Column::CreatedAt)
                .date_time()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned();
    create_table(db, backend, providers_table).await?;

    let config_table = Table::create()
        .table(app_config::Entity)
        .col(
            ColumnDef::new(app_config::Column::Key)
                .string_len(64)
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(app_config::Column::Value).text().not_null())
        .col(ColumnDef::new(app_config::Column::Description).string().null())
        .col(
            ColumnDef::new(app_config::Column::UpdatedAt)
                .date_time()
                .not_null(),
        )
        .to_owned();
    create_table(db, backend, config_table).await?;

    let stats_table = Table::create()
        .table(daily_stats::Entity)
        .col(
            ColumnDef::new(daily_stats::Column::Day)
                .string_len(10)
                .not_null(),
        )
        .col(
            ColumnDef::new(daily_stats::Column::Metric)
                .string_len(32)
                .not_null(),
        )
        .col(
            ColumnDef::new(daily_stats::Column::Count)
                .big_integer()
                .not_null()
                .default(0),
        )
        .primary_key(
            Index::create()
                .col(daily_stats::Column::Day)
                .col(daily_stats::Column::Metric),
        )
        .to_owned();
    create_table(db, backend, stats_table).await?;

    let audit_table = Table::create()
        .table(admin_logs::Entity)
        .col(
            ColumnDef::new(admin_logs::Column::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(admin_logs::Column::Action)
                .string_len(32)
                .not_null(),
        )
        .col(ColumnDef::new(admin_logs::Column::Details).text().not_null())
        .col(ColumnDef::new(admin_logs::Column::ActorIp).string_len(64).null())
        .col(
            ColumnDef::new(admin_logs::Column::CreatedAt)
                .date_time()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned();
    create_table(db, backend, audit_table).await?;

    Ok(())
}

async fn create_table(
    db: &DatabaseConnection,
    backend: DatabaseBackend,
    mut statement: TableCreateStatement,
) -> StorageResult<()> {
    statement.if_not_exists();
    db.execute(backend.build(&statement))
        .await
        .map_err(StorageError::from_source)?;
    Ok(())
}
