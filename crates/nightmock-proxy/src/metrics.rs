//! Prometheus metrics for the nightmock proxy.
//!
//! Counts how each proxied request was answered and how long upstream took.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use tracing::warn;

lazy_static! {
    /// Requests by outcome: mock, proxied, recorded, cache_fallback,
    /// upstream_error, paused, tunnel, tunnel_refused
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "nightmock_requests_total",
        "Total number of requests handled by the proxy, by outcome",
        &["outcome"]
    )
    .unwrap();

    /// Upstream request duration
    pub static ref UPSTREAM_DURATION_MS: HistogramVec = register_histogram_vec!(
        "nightmock_upstream_duration_ms",
        "Duration of upstream requests in milliseconds",
        &["status"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap();
}

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Mock,
    Proxied,
    Recorded,
    CacheFallback,
    UpstreamError,
    Paused,
    Tunnel,
    TunnelRefused,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Mock => "mock",
            Outcome::Proxied => "proxied",
            Outcome::Recorded => "recorded",
            Outcome::CacheFallback => "cache_fallback",
            Outcome::UpstreamError => "upstream_error",
            Outcome::Paused => "paused",
            Outcome::Tunnel => "tunnel",
            Outcome::TunnelRefused => "tunnel_refused",
        }
    }
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_outcome(outcome: Outcome) {
    REQUESTS_TOTAL.with_label_values(&[outcome.as_str()]).inc();
}

/// Helper to record upstream latency
pub fn record_upstream_duration(status: u16, duration_ms: f64) {
    UPSTREAM_DURATION_MS
        .with_label_values(&[&status.to_string()])
        .observe(duration_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_counter_exported() {
        record_outcome(Outcome::CacheFallback);
        record_upstream_duration(200, 12.5);

        let text = collect_metrics();
        assert!(text.contains("nightmock_requests_total"));
        assert!(text.contains(r#"outcome="cache_fallback""#));
        assert!(text.contains("nightmock_upstream_duration_ms"));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::TunnelRefused.as_str(), "tunnel_refused");
        assert_eq!(Outcome::Recorded.as_str(), "recorded");
    }
}
