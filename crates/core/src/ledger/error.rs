//! Ledger error types.
//!
//! Every failure leaving the core is categorized here so that transports can
//! map it without looking at store-specific error text.

use tally_shared::AppError;
use tally_shared::types::{AccountId, OperationTypeId};
use thiserror::Error;

/// Errors that can occur on the ledger write path.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Amount must be a positive magnitude.
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    /// Operation type carries a sign other than -1 or +1.
    #[error("Operation type {operation_type_id} has invalid sign {sign}")]
    InvalidOperation {
        /// The offending operation type.
        operation_type_id: OperationTypeId,
        /// The stored sign.
        sign: i16,
    },

    /// Document number is empty.
    #[error("Document number must not be empty")]
    InvalidDocument,

    // ========== Lookup Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Operation type not found.
    #[error("Operation type not found: {0}")]
    OperationTypeNotFound(OperationTypeId),

    /// Another account already uses this document number.
    #[error("Document number '{0}' already exists")]
    DocumentExists(String),

    // ========== Store Errors ==========
    /// Store-level failure (connection, constraint, commit).
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// The caller canceled or its deadline passed.
    #[error("Operation canceled")]
    Canceled,

    /// The unit of work failed and rolling it back failed too.
    #[error("{cause}; rollback failed: {rollback}")]
    RollbackFailed {
        /// The failure that triggered the rollback.
        cause: Box<LedgerError>,
        /// Why the rollback failed.
        rollback: String,
    },
}

impl LedgerError {
    /// Builds a persistence failure from any displayable store error.
    pub fn persistence(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Persistence(format!("{context}: {err}"))
    }

    /// Combines the original failure with a failed rollback.
    #[must_use]
    pub fn rollback_failed(cause: Self, rollback: &Self) -> Self {
        Self::RollbackFailed {
            cause: Box::new(cause),
            rollback: rollback.to_string(),
        }
    }

    /// The failure that started it all, looking through rollback failures.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::RollbackFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    fn into_root_cause(self) -> Self {
        match self {
            Self::RollbackFailed { cause, .. } => (*cause).into_root_cause(),
            other => other,
        }
    }

    /// Returns true for missing-entity failures.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::AccountNotFound(_) | Self::OperationTypeNotFound(_)
        )
    }

    /// Returns the HTTP status code for this error.
    ///
    /// A failed rollback reports the status of the failure that caused it.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self.root_cause() {
            Self::InvalidAmount | Self::InvalidOperation { .. } | Self::InvalidDocument => 400,
            Self::AccountNotFound(_) | Self::OperationTypeNotFound(_) => 404,
            Self::DocumentExists(_) => 409,
            Self::Canceled => 503,
            Self::Persistence(_) | Self::RollbackFailed { .. } => 500,
        }
    }

    /// Returns the error code for API responses, taken from the root cause.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self.root_cause() {
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::InvalidOperation { .. } => "INVALID_OPERATION",
            Self::InvalidDocument => "INVALID_DOCUMENT",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::OperationTypeNotFound(_) => "OPERATION_TYPE_NOT_FOUND",
            Self::DocumentExists(_) => "DOCUMENT_EXISTS",
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
            Self::Canceled => "CANCELED",
            Self::RollbackFailed { .. } => "ROLLBACK_FAILED",
        }
    }
}

impl From<LedgerError> for AppError {
    /// Categorizes by root cause; the message of a failed rollback is the
    /// root cause's, the rollback reason is left to the caller to log.
    fn from(err: LedgerError) -> Self {
        let err = err.into_root_cause();
        let message = err.to_string();
        match err {
            LedgerError::InvalidAmount
            | LedgerError::InvalidOperation { .. }
            | LedgerError::InvalidDocument => Self::Validation(message),
            LedgerError::AccountNotFound(_) | LedgerError::OperationTypeNotFound(_) => {
                Self::NotFound(message)
            }
            LedgerError::DocumentExists(_) => Self::Conflict(message),
            LedgerError::Canceled => Self::Canceled(message),
            LedgerError::Persistence(_) => Self::Database(message),
            LedgerError::RollbackFailed { .. } => Self::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::InvalidAmount.error_code(), "INVALID_AMOUNT");
        assert_eq!(
            LedgerError::AccountNotFound(AccountId::new(1)).error_code(),
            "ACCOUNT_NOT_FOUND"
        );
        assert_eq!(LedgerError::Canceled.error_code(), "CANCELED");
    }

    #[test]
    fn test_app_error_categories() {
        let status = |e: LedgerError| {
            let direct = e.http_status_code();
            let mapped = AppError::from(e).status_code();
            assert_eq!(direct, mapped);
            mapped
        };

        assert_eq!(status(LedgerError::InvalidAmount), 400);
        assert_eq!(
            status(LedgerError::InvalidOperation {
                operation_type_id: OperationTypeId::new(1),
                sign: 0,
            }),
            400
        );
        assert_eq!(status(LedgerError::AccountNotFound(AccountId::new(9))), 404);
        assert_eq!(
            status(LedgerError::OperationTypeNotFound(OperationTypeId::new(9))),
            404
        );
        assert_eq!(status(LedgerError::DocumentExists("1".into())), 409);
        assert_eq!(status(LedgerError::Canceled), 503);
        assert_eq!(status(LedgerError::Persistence("boom".into())), 500);
    }

    #[test]
    fn test_rollback_failure_keeps_both_reasons() {
        let err = LedgerError::rollback_failed(
            LedgerError::AccountNotFound(AccountId::new(3)),
            &LedgerError::Persistence("connection reset".into()),
        );

        assert_eq!(
            err.to_string(),
            "Account not found: 3; rollback failed: Persistence failure: connection reset"
        );
        assert!(err.root_cause().is_not_found());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "ACCOUNT_NOT_FOUND");

        let app = AppError::from(err);
        assert_eq!(app.status_code(), 404);
        assert_eq!(app.public_message(), "Not found: Account not found: 3");
    }

    #[test]
    fn test_rollback_failure_after_store_failure_stays_opaque() {
        let err = LedgerError::rollback_failed(
            LedgerError::Persistence("commit: connection reset".into()),
            &LedgerError::Persistence("rollback: connection reset".into()),
        );

        assert_eq!(err.http_status_code(), 500);
        assert!(AppError::from(err).is_opaque());
    }

    #[test]
    fn test_persistence_hides_behind_opaque_app_error() {
        let app = AppError::from(LedgerError::persistence("insert", "duplicate key"));
        assert!(app.is_opaque());
        assert_eq!(app.public_message(), "An error occurred");
    }
}
