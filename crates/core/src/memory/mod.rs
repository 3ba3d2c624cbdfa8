//! In-memory ledger store.
//!
//! Implements every capability trait with the same observable behavior as the
//! relational store: locking reads block on a per-account row lock held until
//! commit or rollback, writes made inside a unit of work stay invisible to
//! other callers until commit, and rollback discards them. Faults can be
//! injected into begin, commit and rollback.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tally_shared::types::{AccountId, OperationTypeId, TransactionId};
use tokio::sync::OwnedMutexGuard;

use crate::ledger::context::ExecutionContext;
use crate::ledger::error::LedgerError;
use crate::ledger::service::LedgerService;
use crate::ledger::store::{
    AccountStore, LOCK_REQUIRES_TRANSACTION, OperationTypeStore, TransactionStore,
};
use crate::ledger::types::{
    Account, NewAccount, NewTransaction, OperationType, Transaction, default_operation_types,
};
use crate::ledger::unit_of_work::UnitOfWork;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    operation_types: HashMap<OperationTypeId, OperationType>,
    transactions: Vec<Transaction>,
}

impl State {
    fn document_taken(&self, document_number: &str) -> bool {
        self.accounts
            .values()
            .any(|a| a.document_number == document_number)
    }
}

#[derive(Debug, Default)]
struct Faults {
    begin: AtomicBool,
    commit: AtomicBool,
    rollback: AtomicBool,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    row_locks: Mutex<HashMap<AccountId, Arc<tokio::sync::Mutex<()>>>>,
    next_account_id: AtomicI64,
    next_transaction_id: AtomicI64,
    begins: AtomicUsize,
    faults: Faults,
}

/// Writes staged by one unit of work.
#[derive(Debug, Default)]
struct Staged {
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
}

/// Transaction handle of [`MemoryLedger`].
///
/// Dropping it without commit behaves like a rollback.
#[derive(Debug, Default)]
pub struct MemoryTx {
    staged: Mutex<Staged>,
    row_locks: Mutex<Vec<OwnedMutexGuard<()>>>,
    locked: Mutex<HashSet<AccountId>>,
}

/// Shared in-memory ledger; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Inner>,
}

impl MemoryLedger {
    /// An empty ledger with no reference data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger seeded with the standard operation types.
    #[must_use]
    pub fn with_default_operation_types() -> Self {
        let ledger = Self::new();
        for operation_type in default_operation_types() {
            ledger.seed_operation_type(operation_type);
        }
        ledger
    }

    /// Inserts or replaces an operation type, bypassing sign validation.
    pub fn seed_operation_type(&self, operation_type: OperationType) {
        lock(&self.inner.state)
            .operation_types
            .insert(operation_type.id, operation_type);
    }

    /// Committed transactions in append order.
    #[must_use]
    pub fn transactions(&self) -> Vec<Transaction> {
        lock(&self.inner.state).transactions.clone()
    }

    /// Committed accounts ordered by id.
    #[must_use]
    pub fn accounts(&self) -> Vec<Account> {
        lock(&self.inner.state).accounts.values().cloned().collect()
    }

    /// Number of units of work begun so far.
    #[must_use]
    pub fn begin_count(&self) -> usize {
        self.inner.begins.load(Ordering::SeqCst)
    }

    /// Makes the next `begin` fail.
    pub fn fail_next_begin(&self) {
        self.inner.faults.begin.store(true, Ordering::SeqCst);
    }

    /// Makes the next `commit` fail; the transaction is discarded.
    pub fn fail_next_commit(&self) {
        self.inner.faults.commit.store(true, Ordering::SeqCst);
    }

    /// Makes the next `rollback` report a failure; the transaction is still discarded.
    pub fn fail_next_rollback(&self) {
        self.inner.faults.rollback.store(true, Ordering::SeqCst);
    }

    /// A ledger service whose unit of work and stores are all this ledger.
    #[must_use]
    pub fn service(&self) -> LedgerService<Self> {
        let store = Arc::new(self.clone());
        LedgerService::new(store.clone(), store.clone(), store.clone(), store)
    }

    fn row_lock(&self, id: AccountId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(lock(&self.inner.row_locks).entry(id).or_default())
    }

    /// Account as seen from `ctx`: committed rows plus the caller's own staged rows.
    fn visible_account(
        &self,
        ctx: &ExecutionContext<'_, MemoryTx>,
        id: AccountId,
    ) -> Option<Account> {
        if let Some(account) = lock(&self.inner.state).accounts.get(&id) {
            return Some(account.clone());
        }
        ctx.transaction().and_then(|tx| {
            lock(&tx.staged)
                .accounts
                .iter()
                .find(|a| a.id == id)
                .cloned()
        })
    }
}

#[async_trait]
impl UnitOfWork for MemoryLedger {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, LedgerError> {
        if self.inner.faults.begin.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Persistence("injected begin failure".into()));
        }
        self.inner.begins.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryTx::default())
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), LedgerError> {
        if self.inner.faults.commit.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Persistence("injected commit failure".into()));
        }

        let staged = std::mem::take(&mut *lock(&tx.staged));
        let mut state = lock(&self.inner.state);

        // Unique index check, as a concurrent unit of work may have committed first.
        if let Some(dup) = staged
            .accounts
            .iter()
            .find(|a| state.document_taken(&a.document_number))
        {
            return Err(LedgerError::DocumentExists(dup.document_number.clone()));
        }

        for account in staged.accounts {
            state.accounts.insert(account.id, account);
        }
        state.transactions.extend(staged.transactions);
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> Result<(), LedgerError> {
        drop(tx);
        if self.inner.faults.rollback.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Persistence("injected rollback failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore<MemoryTx> for MemoryLedger {
    async fn create(
        &self,
        ctx: &ExecutionContext<'_, MemoryTx>,
        account: NewAccount,
    ) -> Result<Account, LedgerError> {
        ctx.guard(async {
            let staged_dup = ctx.transaction().is_some_and(|tx| {
                lock(&tx.staged)
                    .accounts
                    .iter()
                    .any(|a| a.document_number == account.document_number)
            });
            if staged_dup || lock(&self.inner.state).document_taken(&account.document_number) {
                return Err(LedgerError::DocumentExists(account.document_number));
            }

            let id = AccountId::new(self.inner.next_account_id.fetch_add(1, Ordering::SeqCst) + 1);
            let account = Account {
                id,
                document_number: account.document_number,
                created_at: account.created_at,
            };

            match ctx.transaction() {
                Some(tx) => lock(&tx.staged).accounts.push(account.clone()),
                None => {
                    lock(&self.inner.state).accounts.insert(id, account.clone());
                }
            }
            Ok(account)
        })
        .await
    }

    async fn find_by_id(
        &self,
        ctx: &ExecutionContext<'_, MemoryTx>,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        ctx.guard(async {
            self.visible_account(ctx, id)
                .ok_or(LedgerError::AccountNotFound(id))
        })
        .await
    }

    async fn find_by_id_for_update(
        &self,
        ctx: &ExecutionContext<'_, MemoryTx>,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        let tx = ctx
            .transaction()
            .ok_or_else(|| LedgerError::Persistence(LOCK_REQUIRES_TRANSACTION.into()))?;

        if self.visible_account(ctx, id).is_none() {
            return Err(LedgerError::AccountNotFound(id));
        }

        if !lock(&tx.locked).contains(&id) {
            let row = self.row_lock(id);
            let guard = ctx.guard(async move { Ok(row.lock_owned().await) }).await?;
            lock(&tx.row_locks).push(guard);
            lock(&tx.locked).insert(id);
        }

        self.visible_account(ctx, id)
            .ok_or(LedgerError::AccountNotFound(id))
    }
}

#[async_trait]
impl OperationTypeStore<MemoryTx> for MemoryLedger {
    async fn find_by_id(
        &self,
        ctx: &ExecutionContext<'_, MemoryTx>,
        id: OperationTypeId,
    ) -> Result<OperationType, LedgerError> {
        ctx.guard(async {
            lock(&self.inner.state)
                .operation_types
                .get(&id)
                .cloned()
                .ok_or(LedgerError::OperationTypeNotFound(id))
        })
        .await
    }
}

#[async_trait]
impl TransactionStore<MemoryTx> for MemoryLedger {
    async fn append(
        &self,
        ctx: &ExecutionContext<'_, MemoryTx>,
        transaction: NewTransaction,
    ) -> Result<Transaction, LedgerError> {
        ctx.guard(async {
            if self.visible_account(ctx, transaction.account_id).is_none() {
                return Err(LedgerError::Persistence(format!(
                    "foreign key violation: account {} does not exist",
                    transaction.account_id
                )));
            }
            if !lock(&self.inner.state)
                .operation_types
                .contains_key(&transaction.operation_type_id)
            {
                return Err(LedgerError::Persistence(format!(
                    "foreign key violation: operation type {} does not exist",
                    transaction.operation_type_id
                )));
            }

            let id = TransactionId::new(
                self.inner.next_transaction_id.fetch_add(1, Ordering::SeqCst) + 1,
            );
            let transaction = transaction.into_transaction(id);

            match ctx.transaction() {
                Some(tx) => lock(&tx.staged).transactions.push(transaction.clone()),
                None => lock(&self.inner.state).transactions.push(transaction.clone()),
            }
            Ok(transaction)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::ledger::context::Cancellation;
    use crate::ledger::types::{NORMAL_PURCHASE, Sign};

    fn detached() -> ExecutionContext<'static, MemoryTx> {
        ExecutionContext::detached(Cancellation::new())
    }

    fn new_account(doc: &str) -> NewAccount {
        NewAccount {
            document_number: doc.to_string(),
            created_at: Utc::now(),
        }
    }

    fn new_transaction(account_id: AccountId) -> NewTransaction {
        let now = Utc::now();
        NewTransaction {
            account_id,
            operation_type_id: NORMAL_PURCHASE,
            amount_minor_units: -100,
            event_date: now,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_staged_writes_are_private_until_commit() {
        let ledger = MemoryLedger::with_default_operation_types();
        let tx = ledger.begin().await.unwrap();
        let bound = ExecutionContext::bound(&tx, Cancellation::new());

        let account = AccountStore::create(&ledger, &bound, new_account("1"))
            .await
            .unwrap();
        ledger
            .append(&bound, new_transaction(account.id))
            .await
            .unwrap();

        assert!(AccountStore::find_by_id(&ledger, &bound, account.id).await.is_ok());
        assert!(matches!(
            AccountStore::find_by_id(&ledger, &detached(), account.id).await,
            Err(LedgerError::AccountNotFound(_))
        ));
        assert!(ledger.transactions().is_empty());

        ledger.commit(tx).await.unwrap();
        assert_eq!(ledger.accounts(), vec![account]);
        assert_eq!(ledger.transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_writes() {
        let ledger = MemoryLedger::with_default_operation_types();
        let tx = ledger.begin().await.unwrap();
        let bound = ExecutionContext::bound(&tx, Cancellation::new());
        AccountStore::create(&ledger, &bound, new_account("1"))
            .await
            .unwrap();

        ledger.rollback(tx).await.unwrap();
        assert!(ledger.accounts().is_empty());
    }

    #[tokio::test]
    async fn test_locking_read_requires_transaction() {
        let ledger = MemoryLedger::new();
        let account = AccountStore::create(&ledger, &detached(), new_account("1"))
            .await
            .unwrap();

        let result = ledger.find_by_id_for_update(&detached(), account.id).await;
        assert!(matches!(result, Err(LedgerError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_lock_is_reentrant_within_one_transaction() {
        let ledger = MemoryLedger::new();
        let account = AccountStore::create(&ledger, &detached(), new_account("1"))
            .await
            .unwrap();

        let tx = ledger.begin().await.unwrap();
        let bound = ExecutionContext::bound(&tx, Cancellation::new());
        ledger.find_by_id_for_update(&bound, account.id).await.unwrap();
        ledger.find_by_id_for_update(&bound, account.id).await.unwrap();
        ledger.commit(tx).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_released_on_drop() {
        let ledger = MemoryLedger::new();
        let account = AccountStore::create(&ledger, &detached(), new_account("1"))
            .await
            .unwrap();

        let holder = ledger.begin().await.unwrap();
        let holding = ExecutionContext::bound(&holder, Cancellation::new());
        ledger.find_by_id_for_update(&holding, account.id).await.unwrap();

        let waiter = ledger.begin().await.unwrap();
        let impatient =
            ExecutionContext::bound(&waiter, Cancellation::with_timeout(Duration::from_millis(10)));
        assert!(matches!(
            ledger.find_by_id_for_update(&impatient, account.id).await,
            Err(LedgerError::Canceled)
        ));

        drop(holder);
        let patient = ExecutionContext::bound(&waiter, Cancellation::new());
        assert!(ledger.find_by_id_for_update(&patient, account.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_document_across_transactions() {
        let ledger = MemoryLedger::new();
        let first = ledger.begin().await.unwrap();
        let second = ledger.begin().await.unwrap();

        let in_first = ExecutionContext::bound(&first, Cancellation::new());
        let in_second = ExecutionContext::bound(&second, Cancellation::new());
        AccountStore::create(&ledger, &in_first, new_account("9")).await.unwrap();
        AccountStore::create(&ledger, &in_second, new_account("9")).await.unwrap();

        ledger.commit(first).await.unwrap();
        assert!(matches!(
            ledger.commit(second).await,
            Err(LedgerError::DocumentExists(_))
        ));
        assert_eq!(ledger.accounts().len(), 1);
    }

    #[tokio::test]
    async fn test_append_enforces_references() {
        let ledger = MemoryLedger::new();
        ledger.seed_operation_type(OperationType::new(1, "Normal Purchase", Sign::Debit));

        let result = ledger
            .append(&detached(), new_transaction(AccountId::new(1)))
            .await;
        assert!(matches!(result, Err(LedgerError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_injected_faults_fire_once() {
        let ledger = MemoryLedger::new();
        ledger.fail_next_begin();
        assert!(ledger.begin().await.is_err());
        assert!(ledger.begin().await.is_ok());
        assert_eq!(ledger.begin_count(), 1);
    }
}
