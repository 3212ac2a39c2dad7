// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the lifecycle engine.
//!
//! Uses the `metrics` crate for backend-agnostic collection. The host is
//! responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `lifecycle_engine_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `outcome`: hit, stale_hit, miss, expired
//! - `decision`: admit, probation
//! - `status`: success, error

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a cache read outcome
pub fn record_read(outcome: &str) {
    counter!(
        "lifecycle_engine_reads_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record an admission decision
pub fn record_admission(decision: &str) {
    counter!(
        "lifecycle_engine_admissions_total",
        "decision" => decision.to_string()
    )
    .increment(1);
}

/// Record invalidated entries and their estimated regeneration cost
pub fn record_invalidation(count: u64, estimated_cost: f64) {
    counter!("lifecycle_engine_invalidated_total").increment(count);
    histogram!("lifecycle_engine_invalidation_cost_estimate").record(estimated_cost);
}

/// Record an unbounded pattern scan (the expensive invalidation path)
pub fn record_pattern_scan() {
    counter!("lifecycle_engine_pattern_scans_total").increment(1);
}

/// Record a URL check outcome
pub fn record_url_check(outcome: &str) {
    counter!(
        "lifecycle_engine_url_checks_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a detected source change
pub fn record_change_event() {
    counter!("lifecycle_engine_change_events_total").increment(1);
}

/// Record one webhook delivery attempt
pub fn record_webhook_delivery(status: &str) {
    counter!(
        "lifecycle_engine_webhook_deliveries_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a sweep pass
pub fn record_sweep(examined: usize, removed: usize, ttl_adjusted: usize) {
    counter!("lifecycle_engine_sweeps_total").increment(1);
    histogram!("lifecycle_engine_sweep_examined").record(examined as f64);
    counter!("lifecycle_engine_sweep_removed_total").increment(removed as u64);
    counter!("lifecycle_engine_sweep_ttl_adjusted_total").increment(ttl_adjusted as u64);
}

/// Set the number of registered URL listeners
pub fn set_active_listeners(count: usize) {
    gauge!("lifecycle_engine_active_listeners").set(count as f64);
}

/// Record operation latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "lifecycle_engine_operation_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}
