//! Operation type reference data.

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, Statement, Value,
};
use tally_core::ledger::{
    ExecutionContext, LedgerError, OperationType, OperationTypeStore, default_operation_types,
};
use tally_shared::types::OperationTypeId;

use super::with_connection;
use crate::entities::operation_types;

const UPSERT_SQL: &str = "INSERT INTO operation_types (id, description, sign) VALUES ($1, $2, $3) \
                          ON CONFLICT (id) DO NOTHING";

/// Repository for operation types.
#[derive(Debug, Clone)]
pub struct OperationTypeRepository {
    db: DatabaseConnection,
}

impl OperationTypeRepository {
    /// Creates a new operation type repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts the standard operation types, leaving existing ids untouched.
    ///
    /// Returns the number of rows inserted.
    pub async fn seed_defaults(&self) -> Result<u64, LedgerError> {
        let backend = self.db.get_database_backend();
        let mut inserted = 0;

        for operation_type in default_operation_types() {
            let result = self
                .db
                .execute(Statement::from_sql_and_values(
                    backend,
                    UPSERT_SQL,
                    [
                        Value::from(operation_type.id.into_inner()),
                        Value::from(operation_type.description),
                        Value::from(operation_type.sign),
                    ],
                ))
                .await
                .map_err(|e| LedgerError::persistence("seed operation types", e))?;
            inserted += result.rows_affected();
        }

        tracing::debug!(inserted, "operation types seeded");
        Ok(inserted)
    }
}

#[async_trait]
impl OperationTypeStore<DatabaseTransaction> for OperationTypeRepository {
    async fn find_by_id(
        &self,
        ctx: &ExecutionContext<'_, DatabaseTransaction>,
        id: OperationTypeId,
    ) -> Result<OperationType, LedgerError> {
        let query = operation_types::Entity::find_by_id(id.into_inner());

        let found = ctx
            .guard(async {
                with_connection!(self, ctx, |conn| query.one(conn).await)
                    .map_err(|e| LedgerError::persistence("find operation type", e))
            })
            .await?;

        found
            .map(|model| OperationType {
                id: OperationTypeId::new(model.id),
                description: model.description,
                sign: model.sign,
            })
            .ok_or(LedgerError::OperationTypeNotFound(id))
    }
}
