//! Metrics Collector for Ruster x402
//!
//! Per-endpoint traffic, revenue and latency, rendered as Prometheus text.
//!
//! - Counters are monotonic atomics inside sharded maps
//! - Latency keeps only the most recent N samples per endpoint (FIFO)
//! - Revenue is accumulated in micro-units of the settlement asset so the
//!   counter stays a plain atomic

use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::utils::constants::{DEFAULT_LATENCY_WINDOW, LATENCY_BUCKETS_SECS};

const MICRO_UNITS: f64 = 1_000_000.0;

#[derive(Default)]
struct PaymentCounter {
    count: AtomicU64,
    micro_amount: AtomicU64,
}

pub struct MetricsCollector {
    requests: DashMap<(String, String), AtomicU64>,
    payments: DashMap<String, PaymentCounter>,
    durations: DashMap<String, Mutex<VecDeque<f64>>>,
    window: usize,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

impl MetricsCollector {
    pub fn new(window: usize) -> Self {
        Self {
            requests: DashMap::new(),
            payments: DashMap::new(),
            durations: DashMap::new(),
            window: window.max(1),
            start_time: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn record_request(&self, endpoint: &str, status: &str) {
        let key = (endpoint.to_string(), status.to_string());
        if let Some(counter) = self.requests.get(&key) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.requests
            .entry(key)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Amount as written in the payment requirement (e.g. "0.005")
    pub fn record_payment(&self, endpoint: &str, amount: &str) {
        let micro = match amount.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => (v * MICRO_UNITS).round() as u64,
            _ => {
                warn!(endpoint, amount, "⚠️ Unparseable payment amount, counting payment without revenue");
                0
            }
        };
        let entry = self.payments.entry(endpoint.to_string()).or_default();
        entry.count.fetch_add(1, Ordering::Relaxed);
        entry.micro_amount.fetch_add(micro, Ordering::Relaxed);
    }

    pub fn record_duration(&self, endpoint: &str, duration: Duration) {
        let entry = self
            .durations
            .entry(endpoint.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::with_capacity(self.window.min(64))));
        let mut samples = entry.lock().unwrap_or_else(|e| e.into_inner());
        if samples.len() >= self.window {
            samples.pop_front();
        }
        samples.push_back(duration.as_secs_f64());
    }

    fn duration_samples(&self) -> BTreeMap<String, Vec<f64>> {
        self.durations
            .iter()
            .map(|e| {
                let samples = e.value().lock().unwrap_or_else(|p| p.into_inner());
                (e.key().clone(), samples.iter().copied().collect())
            })
            .collect()
    }

    /// Prometheus text exposition, sorted by labels
    pub fn render(&self) -> String {
        let mut out = String::new();

        let requests: BTreeMap<(String, String), u64> = self
            .requests
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();
        let _ = writeln!(out, "# HELP x402_requests_total Total requests by endpoint and status");
        let _ = writeln!(out, "# TYPE x402_requests_total counter");
        for ((endpoint, status), count) in &requests {
            let _ = writeln!(
                out,
                "x402_requests_total{{endpoint=\"{}\",status=\"{}\"}} {}",
                endpoint, status, count
            );
        }

        let payments: BTreeMap<String, (u64, u64)> = self
            .payments
            .iter()
            .map(|e| {
                (
                    e.key().clone(),
                    (
                        e.value().count.load(Ordering::Relaxed),
                        e.value().micro_amount.load(Ordering::Relaxed),
                    ),
                )
            })
            .collect();
        let _ = writeln!(out, "# HELP x402_payments_total Total accepted payments by endpoint");
        let _ = writeln!(out, "# TYPE x402_payments_total counter");
        for (endpoint, (count, _)) in &payments {
            let _ = writeln!(out, "x402_payments_total{{endpoint=\"{}\"}} {}", endpoint, count);
        }
        let _ = writeln!(out, "# HELP x402_revenue_total Total revenue by endpoint");
        let _ = writeln!(out, "# TYPE x402_revenue_total counter");
        for (endpoint, (_, micro)) in &payments {
            let _ = writeln!(
                out,
                "x402_revenue_total{{endpoint=\"{}\"}} {}",
                endpoint,
                *micro as f64 / MICRO_UNITS
            );
        }

        let _ = writeln!(out, "# HELP x402_response_time_seconds Response time in seconds");
        let _ = writeln!(out, "# TYPE x402_response_time_seconds histogram");
        for (endpoint, samples) in self.duration_samples() {
            for bound in LATENCY_BUCKETS_SECS {
                let le = samples.iter().filter(|s| **s <= bound).count();
                let _ = writeln!(
                    out,
                    "x402_response_time_seconds_bucket{{endpoint=\"{}\",le=\"{}\"}} {}",
                    endpoint, bound, le
                );
            }
            let _ = writeln!(
                out,
                "x402_response_time_seconds_bucket{{endpoint=\"{}\",le=\"+Inf\"}} {}",
                endpoint,
                samples.len()
            );
            let _ = writeln!(
                out,
                "x402_response_time_seconds_sum{{endpoint=\"{}\"}} {}",
                endpoint,
                samples.iter().sum::<f64>()
            );
            let _ = writeln!(
                out,
                "x402_response_time_seconds_count{{endpoint=\"{}\"}} {}",
                endpoint,
                samples.len()
            );
        }

        let _ = writeln!(out, "# HELP x402_uptime_seconds Process uptime in seconds");
        let _ = writeln!(out, "# TYPE x402_uptime_seconds gauge");
        let _ = writeln!(out, "x402_uptime_seconds {}", self.uptime().as_secs());

        out
    }

    /// JSON-friendly view for /stats and the shutdown summary
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut endpoints: BTreeMap<String, EndpointStats> = BTreeMap::new();

        for e in self.requests.iter() {
            let (endpoint, status) = e.key();
            let stats = endpoints.entry(endpoint.clone()).or_default();
            stats
                .requests_by_status
                .insert(status.clone(), e.value().load(Ordering::Relaxed));
        }
        for e in self.payments.iter() {
            let stats = endpoints.entry(e.key().clone()).or_default();
            stats.payments = e.value().count.load(Ordering::Relaxed);
            stats.revenue = e.value().micro_amount.load(Ordering::Relaxed) as f64 / MICRO_UNITS;
        }
        for (endpoint, samples) in self.duration_samples() {
            let stats = endpoints.entry(endpoint).or_default();
            if !samples.is_empty() {
                stats.avg_response_ms =
                    samples.iter().sum::<f64>() / samples.len() as f64 * 1000.0;
            }
        }

        let total_requests = endpoints
            .values()
            .map(|s| s.requests_by_status.values().sum::<u64>())
            .sum();
        let total_payments = endpoints.values().map(|s| s.payments).sum();
        let total_revenue = endpoints.values().map(|s| s.revenue).sum();

        MetricsSnapshot {
            uptime_seconds: self.uptime().as_secs(),
            total_requests,
            total_payments,
            total_revenue,
            endpoints,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EndpointStats {
    pub requests_by_status: BTreeMap<String, u64>,
    pub payments: u64,
    pub revenue: f64,
    pub avg_response_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub total_payments: u64,
    pub total_revenue: f64,
    pub endpoints: BTreeMap<String, EndpointStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn bucket_counts(rendered: &str, endpoint: &str) -> Vec<u64> {
        let prefix = format!("x402_response_time_seconds_bucket{{endpoint=\"{}\"", endpoint);
        rendered
            .lines()
            .filter(|l| l.starts_with(&prefix))
            .map(|l| l.rsplit(' ').next().unwrap().parse().unwrap())
            .collect()
    }

    #[test]
    fn test_render_has_counter_per_endpoint() {
        let m = MetricsCollector::default();
        m.record_request("/api/gas", "200");
        m.record_request("/api/gas", "402");
        m.record_request("/api/scan-token", "200");
        m.record_payment("/api/scan-token", "0.008");

        let out = m.render();
        assert!(out.contains("x402_requests_total{endpoint=\"/api/gas\",status=\"200\"} 1"));
        assert!(out.contains("x402_requests_total{endpoint=\"/api/gas\",status=\"402\"} 1"));
        assert!(out.contains("x402_requests_total{endpoint=\"/api/scan-token\",status=\"200\"} 1"));
        assert!(out.contains("x402_payments_total{endpoint=\"/api/scan-token\"} 1"));
        assert!(out.contains("x402_revenue_total{endpoint=\"/api/scan-token\"} 0.008"));
        assert!(out.contains("x402_uptime_seconds "));
    }

    #[test]
    fn test_buckets_non_decreasing() {
        let m = MetricsCollector::default();
        for ms in [5u64, 30, 30, 120, 700, 3000, 20_000] {
            m.record_duration("/api/mev-check", Duration::from_millis(ms));
        }
        let out = m.render();
        let counts = bucket_counts(&out, "/api/mev-check");
        assert_eq!(counts.len(), LATENCY_BUCKETS_SECS.len() + 1);
        assert!(counts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*counts.last().unwrap(), 7);
        assert!(out.contains("x402_response_time_seconds_count{endpoint=\"/api/mev-check\"} 7"));
    }

    #[test]
    fn test_latency_window_is_fifo() {
        let m = MetricsCollector::new(3);
        for ms in [1u64, 2, 3, 4, 5] {
            m.record_duration("/api/gas", Duration::from_millis(ms));
        }
        let samples = m.duration_samples();
        assert_eq!(samples["/api/gas"], vec![0.003, 0.004, 0.005]);
    }

    #[test]
    fn test_render_is_sorted_and_stable() {
        let m = MetricsCollector::default();
        m.record_request("/api/z", "200");
        m.record_request("/api/a", "200");
        let out = m.render();
        let a = out.find("endpoint=\"/api/a\"").unwrap();
        let z = out.find("endpoint=\"/api/z\"").unwrap();
        assert!(a < z);
    }

    #[test]
    fn test_snapshot_totals() {
        let m = MetricsCollector::default();
        m.record_request("/api/gas", "200");
        m.record_request("/api/gas", "200");
        m.record_payment("/api/gas", "0.001");
        m.record_payment("/api/gas", "0.001");
        m.record_payment("/api/gas", "garbage");

        let snap = m.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.total_payments, 3);
        assert!((snap.total_revenue - 0.002).abs() < 1e-9);
        assert_eq!(snap.endpoints["/api/gas"].requests_by_status["200"], 2);
    }

    #[tokio::test]
    async fn test_concurrent_counters() {
        let m = Arc::new(MetricsCollector::default());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = Arc::clone(&m);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    m.record_request("/api/prompt-test", "200");
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(m
            .render()
            .contains("x402_requests_total{endpoint=\"/api/prompt-test\",status=\"200\"} 800"));
    }
}
