//! Account routes.

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tally_core::ledger::Account;
use tally_shared::types::AccountId;
use tracing::info;

use super::invalid_body;
use crate::{AppState, error::ApiError, extractors::RequestCancellation};

/// Creates the account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(create_account))
        .route("/accounts/{account_id}", get(get_account))
}

/// Request body for creating an account.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Unique business key.
    pub document_number: String,
}

/// Account representation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountResponse {
    /// Account identifier.
    pub account_id: AccountId,
    /// Unique business key.
    pub document_number: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            account_id: account.id,
            document_number: account.document_number,
        }
    }
}

/// POST `/accounts` - Open an account.
async fn create_account(
    State(state): State<AppState>,
    RequestCancellation(cancel): RequestCancellation,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_body(&rejection),
    };

    match state
        .ledger
        .create_account(&cancel, &payload.document_number)
        .await
    {
        Ok(account) => {
            info!(account_id = %account.id, "Account opened");
            (StatusCode::CREATED, Json(AccountResponse::from(account))).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// GET `/accounts/{account_id}` - Get an account.
async fn get_account(
    State(state): State<AppState>,
    RequestCancellation(cancel): RequestCancellation,
    account_id: Result<Path<AccountId>, PathRejection>,
) -> Response {
    let Ok(Path(account_id)) = account_id else {
        return ApiError::bad_request("invalid_account_id", "Account id must be an integer")
            .into_response();
    };

    match state.ledger.get_account(&cancel, account_id).await {
        Ok(account) => (StatusCode::OK, Json(AccountResponse::from(account))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
