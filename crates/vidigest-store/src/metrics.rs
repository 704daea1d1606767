//! Record store metrics collection.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Total store operations by operation and outcome.
    pub const OPERATIONS_TOTAL: &str = "store_operations_total";

    /// Dedup outcomes of conditional creates.
    pub const DEDUP_TOTAL: &str = "store_dedup_total";
}

/// Record a completed store operation.
pub fn record_operation(operation: &str, ok: bool) {
    counter!(
        names::OPERATIONS_TOTAL,
        "operation" => operation.to_string(),
        "outcome" => if ok { "ok" } else { "error" }
    )
    .increment(1);
}

/// Record a conditional-create outcome.
pub fn record_dedup(created: bool) {
    counter!(
        names::DEDUP_TOTAL,
        "outcome" => if created { "created" } else { "existed" }
    )
    .increment(1);
}
