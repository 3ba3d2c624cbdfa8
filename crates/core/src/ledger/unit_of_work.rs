//! Unit of work (transaction manager) abstraction.

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::context::ExecutionContext;
use super::error::LedgerError;

/// Opens, commits and rolls back store-level transactions.
///
/// Implementors provide the three primitives; [`UnitOfWork::run_in_transaction`]
/// builds the commit-or-rollback protocol on top of them.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Store-level transaction handle.
    ///
    /// Dropping a handle that was neither committed nor rolled back must roll
    /// it back without waiting on the store.
    type Tx: Send + Sync + 'static;

    /// Begins a new transaction.
    async fn begin(&self) -> Result<Self::Tx, LedgerError>;

    /// Commits `tx`. Failures are reported as `LedgerError::Persistence`.
    async fn commit(&self, tx: Self::Tx) -> Result<(), LedgerError>;

    /// Rolls back `tx`, discarding its writes and releasing its locks.
    async fn rollback(&self, tx: Self::Tx) -> Result<(), LedgerError>;

    /// Runs `work` inside one transaction.
    ///
    /// When `ctx` is already bound, `work` joins the enclosing transaction and
    /// the outermost call keeps ownership of commit and rollback. Otherwise a
    /// transaction is begun, `work` runs against it, and it is committed on
    /// success or rolled back on failure. If the rollback fails too, both
    /// reasons are returned as `LedgerError::RollbackFailed`. When the caller
    /// gives up, the transaction is dropped instead so that the caller is not
    /// held up by a store still busy with the abandoned statement.
    ///
    /// # Errors
    ///
    /// Returns the failure of `work`, `LedgerError::Canceled` when the caller
    /// gives up, or `LedgerError::Persistence` when begin or commit fail.
    async fn run_in_transaction<T, F>(
        &self,
        ctx: &ExecutionContext<'_, Self::Tx>,
        work: F,
    ) -> Result<T, LedgerError>
    where
        T: Send,
        F: for<'c> FnOnce(ExecutionContext<'c, Self::Tx>) -> BoxFuture<'c, Result<T, LedgerError>>
            + Send,
    {
        let cancel = ctx.cancellation().clone();

        if let Some(tx) = ctx.transaction() {
            tracing::trace!("joining enclosing transaction");
            return work(ExecutionContext::bound(tx, cancel)).await;
        }

        let tx = cancel.guard(self.begin()).await?;
        tracing::debug!("transaction started");

        let outcome = cancel
            .guard(work(ExecutionContext::bound(&tx, cancel.clone())))
            .await;

        match outcome {
            Ok(value) => {
                self.commit(tx).await?;
                tracing::debug!("transaction committed");
                Ok(value)
            }
            Err(LedgerError::Canceled) => {
                drop(tx);
                tracing::debug!("transaction abandoned after cancellation");
                Err(LedgerError::Canceled)
            }
            Err(err) => match self.rollback(tx).await {
                Ok(()) => {
                    tracing::debug!(error = %err, "transaction rolled back");
                    Err(err)
                }
                Err(rollback) => {
                    tracing::warn!(error = %err, rollback_error = %rollback, "rollback failed");
                    Err(LedgerError::rollback_failed(err, &rollback))
                }
            },
        }
    }
}
