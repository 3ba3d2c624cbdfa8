//! Application-wide error categories.
//!
//! Library errors (ledger, persistence) are folded into one of these
//! categories before they reach a transport, so the transport never has to
//! inspect store-specific error formats.

use thiserror::Error;

/// Failure category as seen by a transport.
#[derive(Debug, Error)]
pub enum AppError {
    /// A referenced account or operation type does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request was rejected before any write happened.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A unique key (document number) is already taken.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The caller gave up (deadline or explicit cancellation) before the work finished.
    #[error("Canceled: {0}")]
    Canceled(String),

    /// The store failed to begin, execute or commit.
    #[error("Store failure: {0}")]
    Database(String),

    /// Anything else, including a failed rollback.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this category.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Canceled(_) => 503,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true when the detail text must not be shown to clients.
    ///
    /// Store and internal failures may carry driver messages, SQL fragments
    /// or constraint names.
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_))
    }

    /// Message safe to put in a response body.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.is_opaque() {
            "An error occurred".to_string()
        } else {
            self.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::Validation(String::new()), 400, false)]
    #[case(AppError::NotFound(String::new()), 404, false)]
    #[case(AppError::Conflict(String::new()), 409, false)]
    #[case(AppError::Canceled(String::new()), 503, false)]
    #[case(AppError::Database(String::new()), 500, true)]
    #[case(AppError::Internal(String::new()), 500, true)]
    fn test_category_status(#[case] err: AppError, #[case] status: u16, #[case] opaque: bool) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.is_opaque(), opaque);
    }

    #[test]
    fn test_public_message_hides_store_details() {
        let err = AppError::Database("relation \"accounts\" does not exist".into());
        assert_eq!(err.public_message(), "An error occurred");

        let err = AppError::Internal("pool timed out".into());
        assert_eq!(err.public_message(), "An error occurred");

        let err = AppError::NotFound("Account not found: 7".into());
        assert_eq!(err.public_message(), "Not found: Account not found: 7");
    }
}
