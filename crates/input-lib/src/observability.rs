//! Observability infrastructure for the telemetry agent
//!
//! Provides:
//! - Prometheus metrics (gather latency, errors, record counts)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for gather latency (in seconds)
const GATHER_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    gather_duration_seconds: HistogramVec,
    gather_errors: IntCounterVec,
    records_gathered: IntCounterVec,
    records_dropped: IntCounter,
    inputs_configured: IntGauge,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            gather_duration_seconds: register_histogram_vec!(
                "telemetry_agent_gather_duration_seconds",
                "Time spent in one gather call of an input",
                &["input"],
                GATHER_BUCKETS.to_vec()
            )
            .expect("Failed to register gather_duration_seconds"),

            gather_errors: register_int_counter_vec!(
                "telemetry_agent_gather_errors_total",
                "Total number of failed gather calls",
                &["input"]
            )
            .expect("Failed to register gather_errors_total"),

            records_gathered: register_int_counter_vec!(
                "telemetry_agent_records_gathered_total",
                "Total number of records submitted by inputs",
                &["input"]
            )
            .expect("Failed to register records_gathered_total"),

            records_dropped: register_int_counter!(
                "telemetry_agent_records_dropped_total",
                "Records dropped because the output buffer was full"
            )
            .expect("Failed to register records_dropped_total"),

            inputs_configured: register_int_gauge!(
                "telemetry_agent_inputs_configured",
                "Number of configured input instances"
            )
            .expect("Failed to register inputs_configured"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance. Clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    pub fn observe_gather_duration(&self, input: &str, duration_secs: f64) {
        self.inner()
            .gather_duration_seconds
            .with_label_values(&[input])
            .observe(duration_secs);
    }

    pub fn inc_gather_errors(&self, input: &str) {
        self.inner().gather_errors.with_label_values(&[input]).inc();
    }

    pub fn add_records_gathered(&self, input: &str, count: u64) {
        self.inner()
            .records_gathered
            .with_label_values(&[input])
            .inc_by(count);
    }

    pub fn inc_records_dropped(&self) {
        self.inner().records_dropped.inc();
    }

    pub fn set_inputs_configured(&self, count: i64) {
        self.inner().inputs_configured.set(count);
    }
}

/// Structured logger for agent events
#[derive(Clone)]
pub struct StructuredLogger {
    hostname: String,
}

impl StructuredLogger {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, inputs: usize) {
        info!(
            event = "agent_started",
            host = %self.hostname,
            agent_version = %version,
            inputs = inputs,
            "Telemetry agent started"
        );
    }

    pub fn log_gather_completed(&self, input: &str, records: usize, elapsed: Duration) {
        info!(
            event = "gather_completed",
            host = %self.hostname,
            input = %input,
            records = records,
            elapsed_ms = elapsed.as_millis() as u64,
            "Gather completed"
        );
    }

    pub fn log_gather_failed(&self, input: &str, records: usize, error: &str) {
        warn!(
            event = "gather_failed",
            host = %self.hostname,
            input = %input,
            records = records,
            error = %error,
            "Gather failed, retrying next interval"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            host = %self.hostname,
            reason = %reason,
            "Telemetry agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_metrics_creation() {
        let metrics = AgentMetrics::new();

        metrics.observe_gather_duration("kube_state", 0.25);
        metrics.inc_gather_errors("kube_state");
        metrics.add_records_gathered("dellstoragecenter", 4);
        metrics.inc_records_dropped();
        metrics.set_inputs_configured(2);

        // Handles share the global registry
        let other = AgentMetrics::new();
        other.add_records_gathered("dellstoragecenter", 1);
        let gathered = GLOBAL_METRICS
            .get()
            .unwrap()
            .records_gathered
            .with_label_values(&["dellstoragecenter"])
            .get();
        assert!(gathered >= 5);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("edge-01");
        assert_eq!(logger.hostname, "edge-01");
        logger.log_gather_completed("kube_state", 12, Duration::from_millis(40));
    }
}
