//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Relational implementations of the ledger store capabilities
//! - Database migrations

pub mod entities;
pub mod migration;
pub mod pool_metrics;
pub mod repositories;

pub use repositories::{
    AccountRepository, OperationTypeRepository, TransactionManager, TransactionRepository,
};

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tally_core::LedgerService;
use tally_shared::config::DatabaseConfig;

/// Establishes a pooled connection to the database.
///
/// Every statement's latency is recorded as `db_query_duration_seconds`.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(false);

    let mut db = Database::connect(options).await?;
    db.set_metric_callback(pool_metrics::record_query);
    Ok(db)
}

/// Wires the ledger use cases to the relational stores.
#[must_use]
pub fn ledger_service(db: &DatabaseConnection) -> LedgerService<TransactionManager> {
    LedgerService::new(
        Arc::new(TransactionManager::new(db.clone())),
        Arc::new(AccountRepository::new(db.clone())),
        Arc::new(OperationTypeRepository::new(db.clone())),
        Arc::new(TransactionRepository::new(db.clone())),
    )
}
