// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for conversation-core.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `conversation_core_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for sizes
//!
//! # Labels
//! - `cache`: avatar, media
//! - `component`: directory, resolver, media
//! - `outcome`: published, skipped, failed, cancelled

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

// ═══════════════════════════════════════════════════════════════════════════
// CACHES - Hit rates, sizes and evictions
// ═══════════════════════════════════════════════════════════════════════════

/// Record a cache lookup
pub fn record_cache_lookup(cache: &str, hit: bool) {
    counter!(
        "conversation_core_cache_lookups_total",
        "cache" => cache.to_string(),
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

/// Set current cache size
pub fn set_cache_size(cache: &str, entries: usize, bytes: usize) {
    gauge!("conversation_core_cache_entries", "cache" => cache.to_string()).set(entries as f64);
    gauge!("conversation_core_cache_bytes", "cache" => cache.to_string()).set(bytes as f64);
}

/// Record eviction event
pub fn record_eviction(cache: &str, reason: &str, count: usize, bytes: usize) {
    counter!(
        "conversation_core_evictions_total",
        "cache" => cache.to_string(),
        "reason" => reason.to_string()
    )
    .increment(count as u64);
    counter!(
        "conversation_core_evicted_bytes_total",
        "cache" => cache.to_string()
    )
    .increment(bytes as u64);
}

// ═══════════════════════════════════════════════════════════════════════════
// CELLS - Lifecycle transitions and pressure
// ═══════════════════════════════════════════════════════════════════════════

/// Record a cell state transition
pub fn record_cell_transition(from: &str, to: &str) {
    counter!(
        "conversation_core_cell_transitions_total",
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

/// Record a pressure signal and how many cells it evacuated
pub fn record_pressure_signal(signal: &str, cells: usize) {
    counter!(
        "conversation_core_pressure_signals_total",
        "signal" => signal.to_string()
    )
    .increment(1);
    histogram!("conversation_core_evacuated_cells").record(cells as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// DIRECTORY - Refresh and publish
// ═══════════════════════════════════════════════════════════════════════════

/// Record a refresh outcome
pub fn record_refresh(outcome: &str) {
    counter!(
        "conversation_core_refreshes_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a refresh request that joined an in-flight refresh
pub fn record_refresh_coalesced() {
    counter!("conversation_core_refresh_coalesced_total").increment(1);
}

/// Record a directory publish
pub fn record_publish(entries: usize, dropped: usize) {
    gauge!("conversation_core_directory_entries").set(entries as f64);
    counter!("conversation_core_directory_publishes_total").increment(1);
    if dropped > 0 {
        counter!("conversation_core_directory_dropped_records_total").increment(dropped as u64);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS / LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════

/// Record an error with category for alerting
pub fn record_error(component: &str, operation: &str, error_type: &str) {
    counter!(
        "conversation_core_errors_total",
        "component" => component.to_string(),
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(component: &str, operation: &str, duration: Duration) {
    histogram!(
        "conversation_core_operation_seconds",
        "component" => component.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Set engine state (for monitoring state machine transitions)
pub fn set_engine_state(state: &str) {
    counter!(
        "conversation_core_state_transitions_total",
        "state" => state.to_string()
    )
    .increment(1);
}

/// RAII timer that records latency on drop
pub struct LatencyTimer {
    component: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(component: &'static str, operation: &'static str) -> Self {
        Self {
            component,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.component, self.operation, self.start.elapsed());
    }
}
