//! Error to HTTP response mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tally_core::LedgerError;
use tally_shared::AppError;
use tally_shared::types::MoneyError;
use tracing::{error, warn};

/// An error ready to be rendered as `{"error": ..., "message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
}

impl ApiError {
    /// Builds a client error with an explicit code.
    pub fn bad_request(code: &str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// The response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        if let LedgerError::RollbackFailed { rollback, .. } = &err {
            warn!(error = %err.root_cause(), rollback_error = %rollback, "rollback failed");
        }
        let code = err.error_code().to_ascii_lowercase();
        let message = err.root_cause().to_string();
        let app = AppError::from(err);
        let status =
            StatusCode::from_u16(app.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if app.is_opaque() {
            error!(error = %message, "ledger operation failed");
            return Self {
                status,
                code: "internal_error".to_string(),
                message: app.public_message(),
            };
        }

        Self {
            status,
            code,
            message,
        }
    }
}

impl From<MoneyError> for ApiError {
    fn from(err: MoneyError) -> Self {
        Self::bad_request("invalid_amount", err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.code,
                "message": self.message
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_shared::types::AccountId;

    #[test]
    fn test_categorized_error_keeps_message() {
        let err = ApiError::from(LedgerError::AccountNotFound(AccountId::new(3)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code, "account_not_found");
        assert_eq!(err.message, "Account not found: 3");
    }

    #[test]
    fn test_persistence_error_is_opaque() {
        let err = ApiError::from(LedgerError::Persistence(
            "duplicate key value violates unique constraint".into(),
        ));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "internal_error");
        assert_eq!(err.message, "An error occurred");
    }

    #[test]
    fn test_failed_rollback_keeps_root_cause_category() {
        let err = ApiError::from(LedgerError::rollback_failed(
            LedgerError::AccountNotFound(AccountId::new(8)),
            &LedgerError::Persistence("connection reset".into()),
        ));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code, "account_not_found");
        assert_eq!(err.message, "Account not found: 8");
    }

    #[test]
    fn test_canceled_is_service_unavailable() {
        let err = ApiError::from(LedgerError::Canceled);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, "canceled");
    }
}
