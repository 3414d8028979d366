//! Prometheus metrics for fleetplane
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports:
//! - `fleetplane_operations_total` (counter): exposed operations labeled by operation and outcome.
//! - `fleetplane_backend_call_duration_seconds` (histogram): calls to management clusters labeled by operation.

use std::sync::atomic::AtomicU64;

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

use crate::error::{Error, Result};

/// Outcome label value of a successful operation
pub const OUTCOME_OK: &str = "ok";

/// Labels for the operations counter
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    /// e.g. "create_cluster", "list_management_clusters"
    pub operation: String,
    /// "ok" or the error kind
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BackendLabels {
    pub operation: String,
}

/// Counter of exposed operations
pub static OPERATIONS_TOTAL: Lazy<Family<OperationLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Histogram of management-cluster call durations (seconds)
pub static BACKEND_CALL_DURATION_SECONDS: Lazy<Family<BackendLabels, Histogram>> =
    Lazy::new(|| {
        fn backend_histogram() -> Histogram {
            // 5ms .. ~20s across 13 buckets.
            Histogram::new(exponential_buckets(0.005, 2.0, 13))
        }

        Family::new_with_constructor(backend_histogram)
    });

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "fleetplane_operations",
        "Total number of fleetplane operations by outcome",
        OPERATIONS_TOTAL.clone(),
    );
    registry.register(
        "fleetplane_backend_call_duration_seconds",
        "Duration of calls to management clusters in seconds",
        BACKEND_CALL_DURATION_SECONDS.clone(),
    );

    registry
});

/// Count one operation with its outcome.
pub fn inc_operation(operation: &str, outcome: &str) {
    let labels = OperationLabels {
        operation: operation.to_string(),
        outcome: outcome.to_string(),
    };
    OPERATIONS_TOTAL.get_or_create(&labels).inc();
}

/// Count the outcome of `result` for `operation`.
pub fn record_operation<T>(operation: &str, result: &Result<T>) {
    match result {
        Ok(_) => inc_operation(operation, OUTCOME_OK),
        Err(e) => inc_operation(operation, e.kind().as_str()),
    }
}

pub fn observe_backend_call(operation: &str, seconds: f64) {
    let labels = BackendLabels {
        operation: operation.to_string(),
    };
    BACKEND_CALL_DURATION_SECONDS
        .get_or_create(&labels)
        .observe(seconds);
}

/// Render the registry in the Prometheus text format.
pub fn encode_registry() -> Result<String> {
    let mut buffer = String::new();
    prometheus_client::encoding::text::encode(&mut buffer, &REGISTRY)
        .map_err(|e| Error::Internal(format!("failed to encode metrics: {}", e)))?;
    Ok(buffer)
}
