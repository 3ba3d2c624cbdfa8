//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST routes for accounts and transactions
//! - Request extractors (per-request cancellation)
//! - Error to response mapping
//! - Prometheus request metrics

pub mod error;
pub mod extractors;
pub mod telemetry;
pub mod routes;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{Router, middleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tally_core::LedgerOperations;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Ledger use cases.
    pub ledger: Arc<dyn LedgerOperations>,
    /// Deadline applied to the ledger work of each request.
    pub request_timeout: Duration,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
    /// Renders the Prometheus scrape body.
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Creates the state with the uptime clock starting now.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerOperations>,
        request_timeout: Duration,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            ledger,
            request_timeout,
            started_at: Instant::now(),
            metrics,
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .route_layer(middleware::from_fn(telemetry::track_metrics))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
