//! Request extractors.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tally_core::Cancellation;

use crate::AppState;

/// Cancellation bounded by the configured request timeout.
///
/// Dropping the handler future (client gone) also abandons the ledger work,
/// since every store call runs inside the handler.
#[derive(Debug, Clone)]
pub struct RequestCancellation(pub Cancellation);

impl FromRequestParts<AppState> for RequestCancellation {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(Cancellation::with_timeout(state.request_timeout)))
    }
}
