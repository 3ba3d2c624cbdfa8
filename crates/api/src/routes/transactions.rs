//! Transaction routes.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_core::ledger::CreateTransactionInput;
use tally_shared::types::{AccountId, OperationTypeId, TransactionId, to_minor_units};

use super::invalid_body;
use crate::{AppState, error::ApiError, extractors::RequestCancellation};

/// Creates the transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/transactions", post(create_transaction))
}

/// Request body for recording a transaction.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    /// Target account.
    pub account_id: AccountId,
    /// Operation type deciding the sign.
    pub operation_type_id: OperationTypeId,
    /// Positive amount with at most two decimal places.
    pub amount: Decimal,
}

/// Response for a recorded transaction.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    /// Store-assigned identifier.
    pub transaction_id: TransactionId,
}

/// POST `/transactions` - Record a transaction.
async fn create_transaction(
    State(state): State<AppState>,
    RequestCancellation(cancel): RequestCancellation,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_body(&rejection),
    };

    let amount_minor_units = match to_minor_units(payload.amount) {
        Ok(amount) => amount,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let input = CreateTransactionInput {
        account_id: payload.account_id,
        operation_type_id: payload.operation_type_id,
        amount_minor_units,
    };

    match state.ledger.create_transaction(&cancel, input).await {
        Ok(transaction) => (
            StatusCode::CREATED,
            Json(TransactionResponse {
                transaction_id: transaction.id,
            }),
        )
            .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
