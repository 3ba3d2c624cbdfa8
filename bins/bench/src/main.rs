//! Tally load generator.
//!
//! Creates a test account, then drives `GET /health`, `GET /accounts/{id}`
//! and `POST /transactions` concurrently at a fixed rate and prints latency
//! and status statistics per endpoint. With `--prometheus`, the results are
//! cross-checked against the server's own request metrics.

mod prometheus;
mod stats;

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, bail};
use clap::Parser;
use reqwest::{Client, Method, RequestBuilder};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use prometheus::{Audit, Observed, Prometheus};
use stats::{Report, Sample};

/// Operation type used for benchmark writes (credit voucher).
const BENCH_OPERATION_TYPE: i32 = 4;

/// Highest accepted `--rate`; keeps the per-endpoint tick above zero.
const MAX_RATE: i64 = 1_000_000;

#[derive(Parser, Debug)]
#[command(name = "bench", version, about = "Load generator for the Tally API")]
struct Cli {
    /// Base URL of the server under test
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,

    /// Total requests per second, split evenly between endpoints
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=MAX_RATE))]
    rate: u32,

    /// Run length, e.g. 500ms, 30s, 2m
    #[arg(long, default_value = "60s", value_parser = parse_duration)]
    duration: Duration,

    /// Minimum success rate in percent required of every endpoint
    #[arg(long, default_value = "99")]
    min_success: Decimal,

    /// Prometheus server to audit request counts and latencies against
    #[arg(long)]
    prometheus: Option<String>,

    /// Time to let Prometheus scrape before auditing
    #[arg(long, default_value = "15s", value_parser = parse_duration)]
    scrape_wait: Duration,
}

/// Parses `<n>ms`, `<n>s`, `<n>m` or `<n>h`. A bare number is seconds.
fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration: {raw:?}"))?;

    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "" | "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        "h" => Duration::from_secs(value.saturating_mul(3600)),
        other => return Err(format!("unknown duration unit: {other:?}")),
    };
    if duration.is_zero() {
        return Err("duration must be positive".to_string());
    }
    Ok(duration)
}

/// One target of the load run.
#[derive(Debug, Clone)]
struct Endpoint {
    name: &'static str,
    /// Route template the server labels metrics with.
    route: &'static str,
    method: Method,
    path: String,
    body: Option<Value>,
}

impl Endpoint {
    fn request(&self, client: &Client, base_url: &str) -> RequestBuilder {
        let builder = client.request(self.method.clone(), format!("{base_url}{}", self.path));
        match &self.body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }
}

fn endpoints(account_id: i64) -> Vec<Endpoint> {
    vec![
        Endpoint {
            name: "health",
            route: "/health",
            method: Method::GET,
            path: "/health".to_string(),
            body: None,
        },
        Endpoint {
            name: "get_account",
            route: "/accounts/{account_id}",
            method: Method::GET,
            path: format!("/accounts/{account_id}"),
            body: None,
        },
        Endpoint {
            name: "create_transaction",
            route: "/transactions",
            method: Method::POST,
            path: "/transactions".to_string(),
            body: Some(json!({
                "account_id": account_id,
                "operation_type_id": BENCH_OPERATION_TYPE,
                "amount": "100.00",
            })),
        },
    ]
}

async fn create_test_account(client: &Client, base_url: &str) -> anyhow::Result<i64> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let document = format!("bench-{millis}");

    let response = client
        .post(format!("{base_url}/accounts"))
        .json(&json!({ "document_number": document }))
        .send()
        .await
        .context("POST /accounts failed")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("account creation returned {status}: {body}");
    }

    let body: Value = response.json().await.context("invalid account response")?;
    body.get("account_id")
        .and_then(Value::as_i64)
        .context("account response has no account_id")
}

async fn run_endpoint(
    client: Client,
    base_url: String,
    endpoint: Endpoint,
    rate: u32,
    duration: Duration,
) -> Report {
    let mut ticker = tokio::time::interval(Duration::from_secs(1) / rate);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let started = Instant::now();
    let mut inflight = JoinSet::new();
    while started.elapsed() < duration {
        ticker.tick().await;
        let request = endpoint.request(&client, &base_url);
        inflight.spawn(async move {
            let sent = Instant::now();
            let status = request.send().await.ok().map(|r| r.status().as_u16());
            Sample {
                status,
                latency: sent.elapsed(),
            }
        });
    }

    let mut samples = Vec::new();
    while let Some(joined) = inflight.join_next().await {
        if let Ok(sample) = joined {
            samples.push(sample);
        }
    }
    Report::from_samples(endpoint.name, &samples, started.elapsed())
}

fn print_report(report: &Report) {
    println!("== {} ==", report.name);
    println!(
        "  requests: {}  success: {}%  throughput: {} req/s",
        report.total,
        report.success_rate(),
        report.requests_per_sec()
    );
    println!(
        "  latency: min={:?} mean={:?} p50={:?} p95={:?} p99={:?} max={:?}",
        report.min, report.mean, report.p50, report.p95, report.p99, report.max
    );
    let codes: Vec<String> = report
        .status_codes
        .iter()
        .map(|(code, count)| format!("{code}={count}"))
        .collect();
    println!("  status: {}", codes.join(" "));
}

/// Request counts per route before the run, so that earlier traffic is ignored.
async fn baseline_counts(prom: &Prometheus, targets: &[Endpoint]) -> Vec<Option<Decimal>> {
    let mut counts = Vec::with_capacity(targets.len());
    for endpoint in targets {
        counts.push(prom.request_count(endpoint.route).await.ok().flatten());
    }
    counts
}

async fn observe(prom: &Prometheus, route: &str, baseline: Option<Decimal>) -> Observed {
    let total = prom.request_count(route).await.ok().flatten();
    Observed {
        requests: total.map(|t| t - baseline.unwrap_or_default()),
        p50_micros: prom.latency_micros(route, "0.50").await.ok().flatten(),
        p95_micros: prom.latency_micros(route, "0.95").await.ok().flatten(),
    }
}

fn print_audit(audit: &Audit) {
    let verdict = if audit.passed { "ok" } else { "MISMATCH" };
    println!("  prometheus audit: {verdict}");
    for note in &audit.notes {
        println!("    {note}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let base_url = cli.url.trim_end_matches('/').to_string();
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("failed to build HTTP client")?;

    let account_id = create_test_account(&client, &base_url).await?;
    let targets = endpoints(account_id);
    let per_endpoint = (cli.rate / u32::try_from(targets.len()).unwrap_or(u32::MAX)).max(1);

    println!(
        "bench: {base_url} account={account_id} rate={per_endpoint}/s per endpoint duration={:?}",
        cli.duration
    );

    let prom = cli
        .prometheus
        .as_deref()
        .map(|url| Prometheus::new(client.clone(), url));
    let baselines = match &prom {
        Some(prom) => baseline_counts(prom, &targets).await,
        None => vec![None; targets.len()],
    };

    let mut runs = JoinSet::new();
    for endpoint in targets.iter().cloned() {
        runs.spawn(run_endpoint(
            client.clone(),
            base_url.clone(),
            endpoint,
            per_endpoint,
            cli.duration,
        ));
    }

    let mut reports = Vec::new();
    while let Some(report) = runs.join_next().await {
        reports.push(report.context("endpoint worker panicked")?);
    }
    reports.sort_by(|a, b| a.name.cmp(&b.name));

    let mut audits = Vec::new();
    if let Some(prom) = &prom {
        println!("waiting {:?} for Prometheus to scrape...", cli.scrape_wait);
        tokio::time::sleep(cli.scrape_wait).await;
        for report in &reports {
            let Some(index) = targets.iter().position(|e| e.name == report.name) else {
                continue;
            };
            let observed = observe(prom, targets[index].route, baselines[index]).await;
            audits.push(prometheus::audit(report, &observed));
        }
    }

    for report in &reports {
        print_report(report);
        if let Some(audit) = audits.iter().find(|a| a.name == report.name) {
            print_audit(audit);
        }
    }

    let mismatched: Vec<&str> = audits
        .iter()
        .filter(|a| !a.passed)
        .map(|a| a.name.as_str())
        .collect();
    if !mismatched.is_empty() {
        bail!("Prometheus disagrees on request counts for: {}", mismatched.join(", "));
    }

    let below: Vec<&str> = reports
        .iter()
        .filter(|r| r.success_rate() < cli.min_success)
        .map(|r| r.name.as_str())
        .collect();
    if !below.is_empty() {
        bail!(
            "success rate below {}% for: {}",
            cli.min_success,
            below.join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("500ms", Duration::from_millis(500))]
    #[case("30s", Duration::from_secs(30))]
    #[case("45", Duration::from_secs(45))]
    #[case("2m", Duration::from_secs(120))]
    #[case("1h", Duration::from_secs(3600))]
    fn test_parse_duration(#[case] raw: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("0s")]
    #[case("10d")]
    #[case("fast")]
    fn test_parse_duration_rejects(#[case] raw: &str) {
        assert!(parse_duration(raw).is_err());
    }

    #[test]
    fn test_transaction_endpoint_body() {
        let targets = endpoints(42);
        let tx = targets.iter().find(|e| e.name == "create_transaction").unwrap();
        let body = tx.body.as_ref().unwrap();
        assert_eq!(body["account_id"], 42);
        assert_eq!(body["operation_type_id"], 4);
        assert_eq!(tx.method, Method::POST);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["bench"]);
        assert_eq!(cli.url, "http://localhost:8080");
        assert_eq!(cli.rate, 100);
        assert_eq!(cli.duration, Duration::from_secs(60));
        assert_eq!(cli.min_success, Decimal::from(99));
        assert!(cli.prometheus.is_none());
    }

    #[rstest]
    #[case("0")]
    #[case("1000001")]
    #[case("4000000000")]
    fn test_rate_out_of_range_is_rejected(#[case] rate: &str) {
        assert!(Cli::try_parse_from(["bench", "--rate", rate]).is_err());
    }

    #[test]
    fn test_highest_rate_still_ticks() {
        let cli = Cli::try_parse_from(["bench", "--rate", "1000000"]).unwrap();
        let per_endpoint = cli.rate / 3;
        assert!(!(Duration::from_secs(1) / per_endpoint).is_zero());
    }
}
