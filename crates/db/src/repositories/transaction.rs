//! Append-only transaction repository.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DatabaseTransaction, Set};
use tally_core::ledger::{
    ExecutionContext, LedgerError, NewTransaction, Transaction, TransactionStore,
};
use tally_shared::types::{AccountId, OperationTypeId, TransactionId};

use super::with_connection;
use crate::entities::transactions;

/// Repository for ledger transactions.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    db: DatabaseConnection,
}

impl TransactionRepository {
    /// Creates a new transaction repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TransactionStore<DatabaseTransaction> for TransactionRepository {
    async fn append(
        &self,
        ctx: &ExecutionContext<'_, DatabaseTransaction>,
        transaction: NewTransaction,
    ) -> Result<Transaction, LedgerError> {
        let model = transactions::ActiveModel {
            account_id: Set(transaction.account_id.into_inner()),
            operation_type_id: Set(transaction.operation_type_id.into_inner()),
            amount_minor_units: Set(transaction.amount_minor_units),
            event_date: Set(transaction.event_date.into()),
            created_at: Set(transaction.created_at.into()),
            ..Default::default()
        };

        let inserted = ctx
            .guard(async {
                with_connection!(self, ctx, |conn| model.insert(conn).await)
                    .map_err(|e| LedgerError::persistence("insert transaction", e))
            })
            .await?;

        Ok(Transaction {
            id: TransactionId::new(inserted.id),
            account_id: AccountId::new(inserted.account_id),
            operation_type_id: OperationTypeId::new(inserted.operation_type_id),
            amount_minor_units: inserted.amount_minor_units,
            event_date: inserted.event_date.with_timezone(&Utc),
            created_at: inserted.created_at.with_timezone(&Utc),
        })
    }
}
