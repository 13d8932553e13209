//! Prometheus metrics for the MRF API.
//!
//! Counters and histograms live in a private registry that `GET /metrics`
//! encodes in the text exposition format.

use anyhow::{Context, Result};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

#[derive(Clone)]
pub struct ApiMetrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    workflow_transitions_total: IntCounterVec,
}

impl ApiMetrics {
    pub fn new(registry: Registry) -> Result<Self> {
        let http_requests_total = IntCounterVec::new(
            Opts::new("mrf_http_requests_total", "Total HTTP requests by method and status"),
            &["method", "status"],
        )
        .context("Failed to create http_requests_total counter")?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mrf_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["method"],
        )
        .context("Failed to create http_request_duration_seconds histogram")?;

        let workflow_transitions_total = IntCounterVec::new(
            Opts::new(
                "mrf_workflow_transitions_total",
                "Workflow stage transitions by approval action",
            ),
            &["action"],
        )
        .context("Failed to create workflow_transitions_total counter")?;

        registry
            .register(Box::new(http_requests_total.clone()))
            .context("Failed to register http_requests_total")?;
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .context("Failed to register http_request_duration_seconds")?;
        registry
            .register(Box::new(workflow_transitions_total.clone()))
            .context("Failed to register workflow_transitions_total")?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            workflow_transitions_total,
        })
    }

    pub fn record_request(&self, method: &str, status: u16, elapsed: Duration) {
        self.http_requests_total
            .with_label_values(&[method, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_transition(&self, action: &str) {
        self.workflow_transitions_total
            .with_label_values(&[action])
            .inc();
    }

    /// Text exposition of every registered metric.
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output was not UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_values_are_exposed() {
        let metrics = ApiMetrics::new(Registry::new()).unwrap();
        metrics.record_request("GET", 200, Duration::from_millis(12));
        metrics.record_transition("APPROVED");
        metrics.record_transition("APPROVED");

        let text = metrics.encode().unwrap();
        assert!(text.contains(r#"mrf_http_requests_total{method="GET",status="200"} 1"#));
        assert!(text.contains(r#"mrf_workflow_transitions_total{action="APPROVED"} 2"#));
        assert!(text.contains("mrf_http_request_duration_seconds_bucket"));
    }

    #[test]
    fn test_registries_are_independent() {
        assert!(ApiMetrics::new(Registry::new()).is_ok());
        assert!(ApiMetrics::new(Registry::new()).is_ok());
    }
}
