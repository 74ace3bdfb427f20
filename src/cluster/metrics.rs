//! Prometheus metrics for the reconfiguration engine.
//!
//! Metrics cover:
//! - Change requests (count per request kind and outcome)
//! - Plans (started, completed, failed) and the pending operation count
//! - Operation attempts and executor call latency per operation kind
//! - Retries
//! - Snapshot persistence
//!
//! # Safety
//!
//! All metrics are registered to a custom registry with the "topomorph" prefix to avoid
//! name collisions with other libraries using the default Prometheus registry.
//! Registration errors are handled gracefully: if a metric fails to register,
//! it is returned unregistered instead of panicking.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder, opts,
};
use tracing::warn;

/// Custom Prometheus registry for topomorph metrics.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    Registry::new_custom(Some("topomorph".to_string()), None).unwrap_or_else(|_| Registry::new())
});

/// Declare an IntGauge metric.
macro_rules! define_gauge {
    ($name:ident, $metric_name:expr, $help:expr) => {
        #[doc = $help]
        pub static $name: Lazy<IntGauge> =
            Lazy::new(|| register_int_gauge_safe(&REGISTRY, $metric_name, $help));
    };
}

/// Declare an IntCounterVec metric with labels.
macro_rules! define_counter_vec {
    ($name:ident, $metric_name:expr, $help:expr, [$($label:expr),+ $(,)?]) => {
        #[doc = $help]
        pub static $name: Lazy<IntCounterVec> = Lazy::new(|| {
            register_int_counter_vec_safe(&REGISTRY, $metric_name, $help, &[$($label),+])
        });
    };
}

/// Declare a HistogramVec metric with labels and buckets.
macro_rules! define_histogram_vec {
    ($name:ident, $metric_name:expr, $help:expr, [$($label:expr),+ $(,)?], [$($bucket:expr),+ $(,)?]) => {
        #[doc = $help]
        pub static $name: Lazy<HistogramVec> = Lazy::new(|| {
            register_histogram_vec_safe(&REGISTRY, $metric_name, $help, &[$($label),+], vec![$($bucket),+])
        });
    };
}

// =============================================================================
// Request metrics
// =============================================================================

define_counter_vec!(
    CHANGE_REQUESTS,
    "change_requests_total",
    "Total number of change requests by kind and outcome",
    ["kind", "outcome"]
);

// =============================================================================
// Plan metrics
// =============================================================================

define_counter_vec!(
    PLANS,
    "change_plans_total",
    "Change plans by status (started, completed, failed)",
    ["status"]
);
define_gauge!(
    PENDING_OPERATIONS,
    "pending_operations",
    "Operations left in the change plan in flight"
);

// =============================================================================
// Operation metrics
// =============================================================================

define_counter_vec!(
    OPERATION_ATTEMPTS,
    "operation_attempts_total",
    "Executor calls by operation kind and outcome",
    ["operation", "outcome"]
);
define_histogram_vec!(
    APPLY_DURATION,
    "apply_duration_seconds",
    "Executor call duration in seconds",
    ["operation"],
    [0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
);
define_counter_vec!(
    RETRY_ATTEMPTS,
    "retry_attempts_total",
    "Retry attempts by policy and outcome",
    ["policy", "outcome"]
);

// =============================================================================
// Storage metrics
// =============================================================================

define_histogram_vec!(
    SNAPSHOT_WRITE_DURATION,
    "snapshot_write_duration_seconds",
    "Topology snapshot persistence duration in seconds",
    ["status"],
    [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
);

fn register_int_gauge_safe(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("metric name/help should be valid");
    match registry.register(Box::new(gauge.clone())) {
        Ok(()) => gauge,
        Err(e) => {
            warn!(name, error = %e, "Failed to register IntGauge metric, using unregistered fallback");
            gauge
        }
    }
}

fn register_int_counter_vec_safe(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> IntCounterVec {
    let counter =
        IntCounterVec::new(opts!(name, help), labels).expect("metric opts should be valid");
    match registry.register(Box::new(counter.clone())) {
        Ok(()) => counter,
        Err(e) => {
            warn!(name, error = %e, "Failed to register IntCounterVec metric, using unregistered fallback");
            counter
        }
    }
}

fn register_histogram_vec_safe(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
    buckets: Vec<f64>,
) -> HistogramVec {
    let histogram = HistogramVec::new(HistogramOpts::new(name, help).buckets(buckets), labels)
        .expect("metric opts should be valid");
    match registry.register(Box::new(histogram.clone())) {
        Ok(()) => histogram,
        Err(e) => {
            warn!(name, error = %e, "Failed to register HistogramVec metric, using unregistered fallback");
            histogram
        }
    }
}

/// Force registration of every metric so they show up before first use.
pub fn init_metrics() {
    let _ = &*CHANGE_REQUESTS;
    let _ = &*PLANS;
    let _ = &*PENDING_OPERATIONS;
    let _ = &*OPERATION_ATTEMPTS;
    let _ = &*APPLY_DURATION;
    let _ = &*RETRY_ATTEMPTS;
    let _ = &*SNAPSHOT_WRITE_DURATION;
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn gather_metrics() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}

pub fn record_change_request(kind: &str, outcome: &str) {
    CHANGE_REQUESTS.with_label_values(&[kind, outcome]).inc();
}

pub fn record_plan(status: &str) {
    PLANS.with_label_values(&[status]).inc();
}

pub fn set_pending_operations(count: usize) {
    PENDING_OPERATIONS.set(i64::try_from(count).unwrap_or(i64::MAX));
}

pub fn record_operation_attempt(operation: &str, outcome: &str, duration_secs: f64) {
    OPERATION_ATTEMPTS
        .with_label_values(&[operation, outcome])
        .inc();
    APPLY_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

pub fn record_snapshot_write(status: &str, duration_secs: f64) {
    SNAPSHOT_WRITE_DURATION
        .with_label_values(&[status])
        .observe(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        init_metrics();
        init_metrics();
    }

    #[test]
    fn test_encode_contains_prefix() {
        record_change_request("scale", "accepted");
        let text = encode_metrics().unwrap();
        assert!(text.contains("topomorph_change_requests_total"));
    }

    #[test]
    fn test_counters_increase() {
        let before = OPERATION_ATTEMPTS
            .with_label_values(&["member_join", "success"])
            .get();
        record_operation_attempt("member_join", "success", 0.01);
        let after = OPERATION_ATTEMPTS
            .with_label_values(&["member_join", "success"])
            .get();
        assert!(after > before);
    }
}
