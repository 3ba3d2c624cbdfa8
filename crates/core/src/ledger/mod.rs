//! Transactional ledger write path.
//!
//! - Domain types and the operation type sign
//! - Error taxonomy
//! - Execution context and cancellation
//! - Unit of work and store capabilities
//! - Ledger use cases

pub mod clock;
pub mod context;
pub mod error;
pub mod service;
pub mod store;
pub mod types;
pub mod unit_of_work;

#[cfg(test)]
mod service_props;

pub use clock::{Clock, FixedClock, SystemClock};
pub use context::{Cancellation, ExecutionContext};
pub use error::LedgerError;
pub use service::{LedgerOperations, LedgerService};
pub use store::{AccountStore, OperationTypeStore, TransactionStore};
pub use types::{
    Account, CREDIT_VOUCHER, CreateTransactionInput, NORMAL_PURCHASE, NewAccount, NewTransaction,
    OperationType, PURCHASE_WITH_INSTALLMENTS, Sign, Transaction, WITHDRAWAL,
    default_operation_types,
};
pub use unit_of_work::UnitOfWork;
