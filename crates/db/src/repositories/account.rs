//! Account repository, including the row-locking read.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    EntityTrait, QuerySelect, Set, SqlErr, Statement, Value,
};
use tally_core::ledger::store::LOCK_REQUIRES_TRANSACTION;
use tally_core::ledger::{Account, AccountStore, ExecutionContext, LedgerError, NewAccount};
use tally_shared::types::AccountId;

use super::{is_abandoned_statement, with_connection};
use crate::entities::accounts;

/// Repository for account operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_domain(model: accounts::Model) -> Account {
    Account {
        id: AccountId::new(model.id),
        document_number: model.document_number,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn map_insert_error(err: DbErr, document_number: String) -> LedgerError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => LedgerError::DocumentExists(document_number),
        _ => LedgerError::persistence("insert account", err),
    }
}

/// Largest `lock_timeout` Postgres accepts, in milliseconds.
const MAX_LOCK_TIMEOUT_MS: u64 = 2_147_483_647;

/// Makes the server stop waiting for row locks once `remaining` has elapsed.
///
/// Dropping a waiting query on the client does not stop it on the server,
/// and the connection stays busy until the lock holder finishes. Scoped to
/// the current transaction.
async fn limit_lock_wait(txn: &DatabaseTransaction, remaining: Duration) -> Result<(), DbErr> {
    if txn.get_database_backend() != DbBackend::Postgres {
        return Ok(());
    }
    let millis = u64::try_from(remaining.as_millis())
        .unwrap_or(u64::MAX)
        .clamp(1, MAX_LOCK_TIMEOUT_MS);
    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT set_config('lock_timeout', $1, true)",
        [Value::from(format!("{millis}ms"))],
    ))
    .await?;
    Ok(())
}

#[async_trait]
impl AccountStore<DatabaseTransaction> for AccountRepository {
    async fn create(
        &self,
        ctx: &ExecutionContext<'_, DatabaseTransaction>,
        account: NewAccount,
    ) -> Result<Account, LedgerError> {
        let document_number = account.document_number.clone();
        let model = accounts::ActiveModel {
            document_number: Set(account.document_number),
            created_at: Set(account.created_at.into()),
            ..Default::default()
        };

        let inserted = ctx
            .guard(async {
                with_connection!(self, ctx, |conn| model.insert(conn).await)
                    .map_err(|e| map_insert_error(e, document_number))
            })
            .await?;

        Ok(to_domain(inserted))
    }

    async fn find_by_id(
        &self,
        ctx: &ExecutionContext<'_, DatabaseTransaction>,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        let query = accounts::Entity::find_by_id(id.into_inner());

        let found = ctx
            .guard(async {
                with_connection!(self, ctx, |conn| query.one(conn).await)
                    .map_err(|e| LedgerError::persistence("find account", e))
            })
            .await?;

        found.map(to_domain).ok_or(LedgerError::AccountNotFound(id))
    }

    async fn find_by_id_for_update(
        &self,
        ctx: &ExecutionContext<'_, DatabaseTransaction>,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        let txn = ctx
            .transaction()
            .ok_or_else(|| LedgerError::Persistence(LOCK_REQUIRES_TRANSACTION.into()))?;

        // SELECT ... FOR UPDATE: held until the enclosing transaction ends
        let found = ctx
            .guard(async {
                if let Some(remaining) = ctx.cancellation().remaining() {
                    limit_lock_wait(txn, remaining)
                        .await
                        .map_err(|e| LedgerError::persistence("set lock timeout", e))?;
                }
                accounts::Entity::find_by_id(id.into_inner())
                    .lock_exclusive()
                    .one(txn)
                    .await
                    .map_err(|e| {
                        if is_abandoned_statement(&e) {
                            LedgerError::Canceled
                        } else {
                            LedgerError::persistence("lock account", e)
                        }
                    })
            })
            .await?;

        found.map(to_domain).ok_or(LedgerError::AccountNotFound(id))
    }
}
