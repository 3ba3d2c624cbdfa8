//! Ledger use cases.
//!
//! `LedgerService` owns the transaction creation algorithm: validate the
//! amount, lock the account, resolve the operation type's sign, normalize the
//! amount and append, all inside one unit of work. It depends only on the
//! capability traits in [`super::store`] and [`super::unit_of_work`].

use std::sync::Arc;

use async_trait::async_trait;
use tally_shared::types::{AccountId, OperationTypeId};

use super::clock::{Clock, SystemClock};
use super::context::{Cancellation, ExecutionContext};
use super::error::LedgerError;
use super::store::{AccountStore, OperationTypeStore, TransactionStore};
use super::types::{
    Account, CreateTransactionInput, NewAccount, NewTransaction, OperationType, Transaction,
};
use super::unit_of_work::UnitOfWork;

/// Ledger use cases over a unit of work and its stores.
pub struct LedgerService<U: UnitOfWork> {
    uow: Arc<U>,
    accounts: Arc<dyn AccountStore<U::Tx>>,
    operation_types: Arc<dyn OperationTypeStore<U::Tx>>,
    transactions: Arc<dyn TransactionStore<U::Tx>>,
    clock: Arc<dyn Clock>,
}

impl<U: UnitOfWork> Clone for LedgerService<U> {
    fn clone(&self) -> Self {
        Self {
            uow: Arc::clone(&self.uow),
            accounts: Arc::clone(&self.accounts),
            operation_types: Arc::clone(&self.operation_types),
            transactions: Arc::clone(&self.transactions),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<U: UnitOfWork> LedgerService<U> {
    /// Creates a service using the system clock.
    pub fn new(
        uow: Arc<U>,
        accounts: Arc<dyn AccountStore<U::Tx>>,
        operation_types: Arc<dyn OperationTypeStore<U::Tx>>,
        transactions: Arc<dyn TransactionStore<U::Tx>>,
    ) -> Self {
        Self {
            uow,
            accounts,
            operation_types,
            transactions,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The unit of work, for callers composing several use cases atomically.
    pub fn unit_of_work(&self) -> &U {
        &self.uow
    }

    /// Records a transaction against an account.
    ///
    /// The caller supplies a positive magnitude; the sign always comes from
    /// the operation type. Concurrent calls for the same account are
    /// serialized by the account row lock and wait rather than fail. If `ctx`
    /// is already bound, the work joins that unit of work.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` when `amount_minor_units <= 0` (no store access)
    /// - `AccountNotFound` / `OperationTypeNotFound` for unknown ids
    /// - `InvalidOperation` when the stored sign is not -1 or +1
    /// - `Canceled`, `Persistence` or `RollbackFailed` from the store
    pub async fn create_transaction(
        &self,
        ctx: &ExecutionContext<'_, U::Tx>,
        input: CreateTransactionInput,
    ) -> Result<Transaction, LedgerError> {
        if input.amount_minor_units <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let accounts = Arc::clone(&self.accounts);
        let operation_types = Arc::clone(&self.operation_types);
        let transactions = Arc::clone(&self.transactions);
        let clock = Arc::clone(&self.clock);

        let transaction = self
            .uow
            .run_in_transaction(ctx, move |ctx| {
                Box::pin(async move {
                    let account = accounts
                        .find_by_id_for_update(&ctx, input.account_id)
                        .await?;
                    let operation_type = operation_types
                        .find_by_id(&ctx, input.operation_type_id)
                        .await?;
                    let sign = operation_type.resolve_sign()?;
                    let amount_minor_units = sign.apply(input.amount_minor_units)?;

                    let now = clock.now();
                    transactions
                        .append(
                            &ctx,
                            NewTransaction {
                                account_id: account.id,
                                operation_type_id: operation_type.id,
                                amount_minor_units,
                                event_date: now,
                                created_at: now,
                            },
                        )
                        .await
                })
            })
            .await?;

        tracing::info!(
            transaction_id = %transaction.id,
            account_id = %transaction.account_id,
            operation_type_id = %transaction.operation_type_id,
            amount_minor_units = transaction.amount_minor_units,
            "transaction created"
        );

        Ok(transaction)
    }

    /// Opens an account.
    ///
    /// Surrounding whitespace is dropped from the document number.
    ///
    /// # Errors
    ///
    /// `InvalidDocument` for a blank document number, `DocumentExists` when it
    /// is already taken.
    pub async fn create_account(
        &self,
        ctx: &ExecutionContext<'_, U::Tx>,
        document_number: &str,
    ) -> Result<Account, LedgerError> {
        let document_number = document_number.trim();
        if document_number.is_empty() {
            return Err(LedgerError::InvalidDocument);
        }

        let account = self
            .accounts
            .create(
                ctx,
                NewAccount {
                    document_number: document_number.to_string(),
                    created_at: self.clock.now(),
                },
            )
            .await?;

        tracing::info!(account_id = %account.id, "account created");
        Ok(account)
    }

    /// Reads an account without locking it.
    pub async fn get_account(
        &self,
        ctx: &ExecutionContext<'_, U::Tx>,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        self.accounts.find_by_id(ctx, id).await
    }

    /// Resolves an operation type.
    pub async fn find_operation_type(
        &self,
        ctx: &ExecutionContext<'_, U::Tx>,
        id: OperationTypeId,
    ) -> Result<OperationType, LedgerError> {
        self.operation_types.find_by_id(ctx, id).await
    }
}

/// Object-safe entry point for transports.
///
/// Every call runs outside any caller-held unit of work and honors the given
/// cancellation.
#[async_trait]
pub trait LedgerOperations: Send + Sync {
    /// See [`LedgerService::create_account`].
    async fn create_account(
        &self,
        cancel: &Cancellation,
        document_number: &str,
    ) -> Result<Account, LedgerError>;

    /// See [`LedgerService::get_account`].
    async fn get_account(
        &self,
        cancel: &Cancellation,
        id: AccountId,
    ) -> Result<Account, LedgerError>;

    /// See [`LedgerService::create_transaction`].
    async fn create_transaction(
        &self,
        cancel: &Cancellation,
        input: CreateTransactionInput,
    ) -> Result<Transaction, LedgerError>;
}

#[async_trait]
impl<U: UnitOfWork + 'static> LedgerOperations for LedgerService<U> {
    async fn create_account(
        &self,
        cancel: &Cancellation,
        document_number: &str,
    ) -> Result<Account, LedgerError> {
        let ctx = ExecutionContext::detached(cancel.clone());
        Self::create_account(self, &ctx, document_number).await
    }

    async fn get_account(
        &self,
        cancel: &Cancellation,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        let ctx = ExecutionContext::detached(cancel.clone());
        Self::get_account(self, &ctx, id).await
    }

    async fn create_transaction(
        &self,
        cancel: &Cancellation,
        input: CreateTransactionInput,
    ) -> Result<Transaction, LedgerError> {
        let ctx = ExecutionContext::detached(cancel.clone());
        Self::create_transaction(self, &ctx, input).await
    }
}
