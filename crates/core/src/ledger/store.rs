//! Capability traits for ledger storage.
//!
//! Each trait has one relational implementation (`tally-db`) and one in-memory
//! implementation ([`crate::memory::MemoryLedger`]). All calls take an
//! [`ExecutionContext`] so that work inside a unit of work shares its
//! transaction.

use async_trait::async_trait;
use tally_shared::types::{AccountId, OperationTypeId};

use super::context::ExecutionContext;
use super::error::LedgerError;
use super::types::{Account, NewAccount, NewTransaction, OperationType, Transaction};

/// Account access, including the locking read.
#[async_trait]
pub trait AccountStore<Tx>: Send + Sync {
    /// Inserts an account.
    ///
    /// # Errors
    ///
    /// `LedgerError::DocumentExists` when the document number is taken.
    async fn create(
        &self,
        ctx: &ExecutionContext<'_, Tx>,
        account: NewAccount,
    ) -> Result<Account, LedgerError>;

    /// Non-locking read.
    ///
    /// # Errors
    ///
    /// `LedgerError::AccountNotFound` when no such account exists.
    async fn find_by_id(
        &self,
        ctx: &ExecutionContext<'_, Tx>,
        id: AccountId,
    ) -> Result<Account, LedgerError>;

    /// Locking read held until the enclosing unit of work ends.
    ///
    /// Concurrent locking reads of the same account wait for the holder to
    /// commit or roll back. Plain reads are not blocked.
    ///
    /// # Errors
    ///
    /// `LedgerError::AccountNotFound` when no such account exists, and
    /// `LedgerError::Persistence` when `ctx` is not bound to a transaction.
    async fn find_by_id_for_update(
        &self,
        ctx: &ExecutionContext<'_, Tx>,
        id: AccountId,
    ) -> Result<Account, LedgerError>;
}

/// Read-only operation type reference data.
#[async_trait]
pub trait OperationTypeStore<Tx>: Send + Sync {
    /// Looks up an operation type with its sign as stored.
    ///
    /// # Errors
    ///
    /// `LedgerError::OperationTypeNotFound` when no such operation type exists.
    async fn find_by_id(
        &self,
        ctx: &ExecutionContext<'_, Tx>,
        id: OperationTypeId,
    ) -> Result<OperationType, LedgerError>;
}

/// Append-only transaction log.
#[async_trait]
pub trait TransactionStore<Tx>: Send + Sync {
    /// Appends a transaction and returns it with its store-assigned id.
    async fn append(
        &self,
        ctx: &ExecutionContext<'_, Tx>,
        transaction: NewTransaction,
    ) -> Result<Transaction, LedgerError>;
}

/// Message used when a locking read is attempted outside a unit of work.
pub const LOCK_REQUIRES_TRANSACTION: &str = "locking read requires an active unit of work";
