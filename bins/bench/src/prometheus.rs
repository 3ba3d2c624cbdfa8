//! Cross-check of bench results against what the server reported to Prometheus.
//!
//! Request counts must agree within 15%. Latency quantiles are compared
//! within 30% but only reported, since histogram buckets are coarse.

use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::stats::Report;

/// Allowed request count drift, in percent.
const COUNT_TOLERANCE_PCT: u32 = 15;

/// Allowed latency quantile drift, in percent.
const LATENCY_TOLERANCE_PCT: u32 = 30;

/// Minimal client for the Prometheus HTTP query API.
#[derive(Debug, Clone)]
pub struct Prometheus {
    client: Client,
    base_url: String,
}

/// What Prometheus saw for one route.
#[derive(Debug, Clone, Copy, Default)]
pub struct Observed {
    /// Requests counted during the run.
    pub requests: Option<Decimal>,
    /// Median latency in microseconds.
    pub p50_micros: Option<Decimal>,
    /// 95th percentile latency in microseconds.
    pub p95_micros: Option<Decimal>,
}

impl Prometheus {
    /// A client for the server at `base_url`.
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Evaluates an instant query and returns its first sample.
    pub async fn query(&self, promql: &str) -> anyhow::Result<Option<Decimal>> {
        let body: Value = self
            .client
            .get(format!("{}/api/v1/query", self.base_url))
            .query(&[("query", promql)])
            .send()
            .await
            .context("Prometheus query failed")?
            .error_for_status()?
            .json()
            .await
            .context("invalid Prometheus response")?;
        Ok(first_sample(&body))
    }

    /// Total `http_requests_total` for a route template.
    pub async fn request_count(&self, route: &str) -> anyhow::Result<Option<Decimal>> {
        self.query(&format!("sum(http_requests_total{{path=\"{route}\"}})"))
            .await
    }

    /// Latency quantile for a route template, in microseconds.
    pub async fn latency_micros(
        &self,
        route: &str,
        quantile: &str,
    ) -> anyhow::Result<Option<Decimal>> {
        let buckets = format!("http_request_duration_seconds_bucket{{path=\"{route}\"}}");
        self.query(&format!(
            "histogram_quantile({quantile}, sum(rate({buckets}[5m])) by (le)) * 1000000"
        ))
        .await
    }
}

/// Value of the first vector sample, `None` for empty results or NaN.
pub fn first_sample(body: &Value) -> Option<Decimal> {
    let raw = body.pointer("/data/result/0/value/1").and_then(Value::as_str)?;
    raw.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(raw).ok())
}

/// Outcome of comparing one endpoint.
#[derive(Debug, Clone)]
pub struct Audit {
    /// Endpoint label.
    pub name: String,
    /// Request count mismatches fail the audit.
    pub passed: bool,
    /// Human-readable differences.
    pub notes: Vec<String>,
}

fn micros(duration: Duration) -> Decimal {
    Decimal::from(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
}

fn exceeds(expected: Decimal, actual: Decimal, tolerance_pct: u32) -> bool {
    (expected - actual).abs() > expected * Decimal::from(tolerance_pct) / Decimal::ONE_HUNDRED
}

/// Compares a bench report with what Prometheus observed.
pub fn audit(report: &Report, observed: &Observed) -> Audit {
    let mut notes = Vec::new();
    let mut passed = true;
    let sent = Decimal::from(report.total);

    match observed.requests {
        Some(counted) if exceeds(sent, counted, COUNT_TOLERANCE_PCT) => {
            passed = false;
            notes.push(format!("request count: bench={sent}, prometheus={counted}"));
        }
        Some(_) => {}
        None => notes.push("no request count in Prometheus".to_string()),
    }

    for (label, ours, theirs) in [
        ("p50", report.p50, observed.p50_micros),
        ("p95", report.p95, observed.p95_micros),
    ] {
        let ours = micros(ours);
        if let Some(theirs) = theirs
            && !ours.is_zero()
            && exceeds(ours, theirs, LATENCY_TOLERANCE_PCT)
        {
            notes.push(format!(
                "{label}: bench={ours}µs, prometheus={}µs",
                theirs.round()
            ));
        }
    }

    Audit {
        name: report.name.clone(),
        passed,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn report(total: usize, latency_ms: u64) -> Report {
        let samples: Vec<_> = (0..total)
            .map(|_| crate::stats::Sample {
                status: Some(200),
                latency: Duration::from_millis(latency_ms),
            })
            .collect();
        Report::from_samples("health", &samples, Duration::from_secs(10))
    }

    #[test]
    fn test_first_sample() {
        let body = json!({
            "status": "success",
            "data": { "resultType": "vector", "result": [
                { "metric": {}, "value": [1_700_000_000.5, "1000"] }
            ]}
        });
        assert_eq!(first_sample(&body), Some(dec!(1000)));

        let body = json!({ "data": { "result": [{ "value": [0, "1.5e+03"] }] } });
        assert_eq!(first_sample(&body), Some(dec!(1500)));

        let body = json!({ "data": { "result": [{ "value": [0, "NaN"] }] } });
        assert_eq!(first_sample(&body), None);

        let body = json!({ "data": { "result": [] } });
        assert_eq!(first_sample(&body), None);
    }

    #[test]
    fn test_audit_accepts_small_count_drift() {
        let observed = Observed {
            requests: Some(dec!(95)),
            p50_micros: Some(dec!(2000)),
            p95_micros: None,
        };
        let result = audit(&report(100, 2), &observed);
        assert!(result.passed);
        assert!(result.notes.is_empty(), "{:?}", result.notes);
    }

    #[test]
    fn test_audit_fails_on_count_mismatch() {
        let observed = Observed {
            requests: Some(dec!(50)),
            ..Observed::default()
        };
        let result = audit(&report(100, 2), &observed);
        assert!(!result.passed);
        assert!(result.notes[0].starts_with("request count"));
    }

    #[test]
    fn test_latency_drift_is_reported_not_failed() {
        let observed = Observed {
            requests: Some(dec!(100)),
            p50_micros: Some(dec!(9000)),
            p95_micros: None,
        };
        let result = audit(&report(100, 2), &observed);
        assert!(result.passed);
        assert_eq!(result.notes, vec!["p50: bench=2000µs, prometheus=9000µs"]);
    }
}
