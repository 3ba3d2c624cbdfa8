//! Repository abstractions for data access.
//!
//! Repositories implement the ledger store capabilities over `SeaORM`, hiding
//! the implementation details from the rest of the application. Every call
//! runs on the transaction carried by the execution context when there is
//! one, and on the pool otherwise.

pub mod account;
pub mod operation_type;
pub mod transaction;
pub mod transaction_manager;

pub use account::AccountRepository;
pub use operation_type::OperationTypeRepository;
pub use transaction::TransactionRepository;
pub use transaction_manager::TransactionManager;

use sea_orm::{DbErr, RuntimeErr};

/// SQLSTATEs of statements the server abandoned on the caller's behalf:
/// `lock_not_available` (lock_timeout) and `query_canceled`.
const ABANDONED_STATEMENT_CODES: [&str; 2] = ["55P03", "57014"];

/// True when the server gave up on a statement because its time ran out.
pub(crate) fn is_abandoned_statement(err: &DbErr) -> bool {
    let sqlx_err = match err {
        DbErr::Query(RuntimeErr::SqlxError(e)) | DbErr::Exec(RuntimeErr::SqlxError(e)) => e,
        _ => return false,
    };
    sqlx_err
        .as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| ABANDONED_STATEMENT_CODES.contains(&code.as_ref()))
}

/// Runs `$body` with `$conn` bound to the context's transaction, or to the
/// repository's pool when the context is detached.
macro_rules! with_connection {
    ($self:ident, $ctx:expr, |$conn:ident| $body:expr) => {
        match $ctx.transaction() {
            Some($conn) => $body,
            None => {
                let $conn = &$self.db;
                $body
            }
        }
    };
}

pub(crate) use with_connection;
