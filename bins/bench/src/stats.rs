//! Latency and status statistics for one endpoint.
//!
//! Percentages are computed with `Decimal`, never floats.

use std::collections::BTreeMap;
use std::time::Duration;

use rust_decimal::Decimal;

/// Outcome of one request. `status` is `None` for transport errors.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    /// HTTP status, if a response arrived.
    pub status: Option<u16>,
    /// Time from send to response.
    pub latency: Duration,
}

/// Aggregated results for one endpoint.
#[derive(Debug, Clone)]
pub struct Report {
    /// Endpoint label.
    pub name: String,
    /// Requests issued.
    pub total: u64,
    /// Requests answered with 2xx.
    pub successes: u64,
    /// Count per status code (`"error"` for transport failures).
    pub status_codes: BTreeMap<String, u64>,
    /// Fastest response.
    pub min: Duration,
    /// Mean latency.
    pub mean: Duration,
    /// Median latency.
    pub p50: Duration,
    /// 95th percentile latency.
    pub p95: Duration,
    /// 99th percentile latency.
    pub p99: Duration,
    /// Slowest response.
    pub max: Duration,
    /// Wall time of the run.
    pub elapsed: Duration,
}

/// Nearest-rank percentile of an ascending slice.
pub fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct * sorted.len()).div_ceil(100);
    sorted[rank.clamp(1, sorted.len()) - 1]
}

impl Report {
    /// Builds a report from raw samples.
    pub fn from_samples(name: &str, samples: &[Sample], elapsed: Duration) -> Self {
        let mut latencies: Vec<Duration> = samples.iter().map(|s| s.latency).collect();
        latencies.sort_unstable();

        let mut status_codes = BTreeMap::new();
        let mut successes = 0;
        for sample in samples {
            let key = sample
                .status
                .map_or_else(|| "error".to_string(), |s| s.to_string());
            *status_codes.entry(key).or_insert(0) += 1;
            if sample.status.is_some_and(|s| (200..300).contains(&s)) {
                successes += 1;
            }
        }

        let total = u64::try_from(samples.len()).unwrap_or(u64::MAX);
        let sum: Duration = latencies.iter().sum();
        let mean = u32::try_from(latencies.len())
            .ok()
            .filter(|n| *n > 0)
            .map_or(Duration::ZERO, |n| sum / n);

        Self {
            name: name.to_string(),
            total,
            successes,
            status_codes,
            min: latencies.first().copied().unwrap_or_default(),
            mean,
            p50: percentile(&latencies, 50),
            p95: percentile(&latencies, 95),
            p99: percentile(&latencies, 99),
            max: latencies.last().copied().unwrap_or_default(),
            elapsed,
        }
    }

    /// Share of 2xx responses, in percent with two decimals.
    pub fn success_rate(&self) -> Decimal {
        if self.total == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.successes) * Decimal::ONE_HUNDRED / Decimal::from(self.total))
            .round_dp(2)
    }

    /// Throughput over the whole run.
    pub fn requests_per_sec(&self) -> Decimal {
        let millis = u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.total) * Decimal::ONE_THOUSAND / Decimal::from(millis)).round_dp(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[rstest]
    #[case(50, ms(50))]
    #[case(95, ms(95))]
    #[case(99, ms(99))]
    #[case(100, ms(100))]
    #[case(0, ms(1))]
    fn test_percentile(#[case] pct: usize, #[case] expected: Duration) {
        let sorted: Vec<Duration> = (1..=100).map(ms).collect();
        assert_eq!(percentile(&sorted, pct), expected);
    }

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile(&[], 99), Duration::ZERO);
    }

    fn sample(status: Option<u16>, millis: u64) -> Sample {
        Sample {
            status,
            latency: ms(millis),
        }
    }

    #[test]
    fn test_report() {
        let samples = [
            sample(Some(201), 10),
            sample(Some(201), 30),
            sample(Some(503), 20),
            sample(None, 40),
        ];
        let report = Report::from_samples("transactions", &samples, Duration::from_secs(2));

        assert_eq!(report.total, 4);
        assert_eq!(report.successes, 2);
        assert_eq!(report.success_rate(), dec!(50));
        assert_eq!(report.requests_per_sec(), dec!(2));
        assert_eq!(report.min, ms(10));
        assert_eq!(report.max, ms(40));
        assert_eq!(report.mean, ms(25));
        assert_eq!(report.p50, ms(20));
        assert_eq!(report.status_codes["201"], 2);
        assert_eq!(report.status_codes["error"], 1);
    }
}
