//! Prometheus request metrics.
//!
//! Every matched route records `http_requests_total{path,method,status}` and
//! `http_request_duration_seconds{path,method}`. The `path` label is the
//! route template (`/accounts/{account_id}`), never the raw URI.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Request counter name.
pub const REQUESTS_TOTAL: &str = "http_requests_total";

/// Request latency histogram name.
pub const REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Histogram buckets in seconds, from 1ms to 10s.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Installs the process-wide Prometheus recorder.
///
/// Latencies are exported as histograms so that quantiles can be computed
/// server side.
///
/// # Errors
///
/// Fails when a global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            DURATION_BUCKETS,
        )?
        .install_recorder()
}

/// Middleware recording count and latency of each request.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path().to_string(), |p| p.as_str().to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        REQUESTS_TOTAL,
        "path" => path.clone(),
        "method" => method.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "path" => path, "method" => method)
        .record(started.elapsed().as_secs_f64());

    response
}
