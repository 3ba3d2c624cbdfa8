//! Unit of work over `SeaORM` database transactions.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tally_core::ledger::{LedgerError, UnitOfWork};

/// Opens one database transaction per unit of work.
///
/// The transaction checks out a pooled connection for its whole lifetime and
/// returns it on commit or rollback. Row locks taken inside it are released
/// at the same moment.
#[derive(Debug, Clone)]
pub struct TransactionManager {
    db: DatabaseConnection,
}

impl TransactionManager {
    /// Creates a new transaction manager.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UnitOfWork for TransactionManager {
    type Tx = DatabaseTransaction;

    async fn begin(&self) -> Result<DatabaseTransaction, LedgerError> {
        self.db
            .begin()
            .await
            .map_err(|e| LedgerError::persistence("begin transaction", e))
    }

    async fn commit(&self, tx: DatabaseTransaction) -> Result<(), LedgerError> {
        tx.commit()
            .await
            .map_err(|e| LedgerError::persistence("commit transaction", e))
    }

    async fn rollback(&self, tx: DatabaseTransaction) -> Result<(), LedgerError> {
        tx.rollback()
            .await
            .map_err(|e| LedgerError::persistence("rollback transaction", e))
    }
}
