//! API route definitions.

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::AppState;

pub mod accounts;
pub mod health;
pub mod metrics;
pub mod transactions;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(metrics::routes())
        .merge(accounts::routes())
        .merge(transactions::routes())
}

/// 400 response for bodies that are not the expected JSON.
fn invalid_body(rejection: &JsonRejection) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "invalid_request_body",
            "message": rejection.body_text()
        })),
    )
        .into_response()
}
