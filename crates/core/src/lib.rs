//! Core ledger write path for Tally.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Stores are reached only through the capability traits in [`ledger::store`]
//! and [`ledger::unit_of_work`].
//!
//! # Modules
//!
//! - `ledger` - Domain types, errors, unit of work and the transaction creation algorithm
//! - `memory` - In-memory store implementing every capability, used by tests

pub mod ledger;
pub mod memory;

pub use ledger::{
    Cancellation, ExecutionContext, LedgerError, LedgerOperations, LedgerService, UnitOfWork,
};
