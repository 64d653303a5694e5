//! Grant store metrics.
//!
//! Counters are emitted through the `metrics` facade; the host process
//! installs the recorder (Prometheus in the server).

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const GRANT_STORE_OPERATIONS_TOTAL: &str = "grant_store_operations_total";
    pub const GRANT_STORE_LOOKUPS_TOTAL: &str = "grant_store_lookups_total";
    pub const GRANT_STORE_PRUNED_TOTAL: &str = "grant_store_pruned_total";
}

/// Record the outcome of a mutating operation.
pub fn record_operation(operation: &'static str, outcome: &'static str) {
    counter!(
        names::GRANT_STORE_OPERATIONS_TOTAL,
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a primary-key lookup.
pub fn record_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!(names::GRANT_STORE_LOOKUPS_TOTAL, "result" => result).increment(1);
}

/// Record stale index members removed by lazy pruning.
pub fn record_pruned(level: &'static str, count: usize) {
    counter!(names::GRANT_STORE_PRUNED_TOTAL, "index" => level).increment(count as u64);
}
