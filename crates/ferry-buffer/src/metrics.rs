// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Prometheus metrics for the buffer subsystem.
//!
//! # Metrics Overview
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `ferry_buffer_records_enqueued_total` | Counter | Records accepted into the buffer |
//! | `ferry_buffer_records_applied_total` | Counter | Records replayed successfully |
//! | `ferry_buffer_records_requeued_total` | Counter | Records re-inserted after a failed apply |
//! | `ferry_buffer_records_dropped_total` | Counter | Records dropped after retry exhaustion |
//! | `ferry_buffer_poison_records_total` | Counter | Records dropped because the payload was undecodable |
//! | `ferry_buffer_corrupt_records_total` | Counter | Store envelopes skipped during iteration |
//! | `ferry_buffer_depth` | Gauge | Records currently buffered |
//! | `ferry_buffer_drain_ticks_total` | CounterVec | Drain ticks by outcome |
//! | `ferry_buffer_drain_duration_seconds` | Histogram | Duration of drain ticks |
//!
//! Metrics register against the default registry and are exported by the
//! API server's `/metrics` endpoint.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Gauge, Histogram,
};

// =============================================================================
// Metric Definitions
// =============================================================================

static RECORDS_ENQUEUED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "ferry_buffer_records_enqueued_total",
        "Total number of records accepted into the buffer"
    )
    .expect("Failed to register records_enqueued_total metric")
});

static RECORDS_APPLIED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "ferry_buffer_records_applied_total",
        "Total number of buffered records replayed successfully"
    )
    .expect("Failed to register records_applied_total metric")
});

static RECORDS_REQUEUED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "ferry_buffer_records_requeued_total",
        "Total number of records re-inserted after a failed apply"
    )
    .expect("Failed to register records_requeued_total metric")
});

static RECORDS_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "ferry_buffer_records_dropped_total",
        "Total number of records dropped after exhausting their retry budget"
    )
    .expect("Failed to register records_dropped_total metric")
});

static POISON_RECORDS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "ferry_buffer_poison_records_total",
        "Total number of records dropped because their payload was undecodable"
    )
    .expect("Failed to register poison_records_total metric")
});

static CORRUPT_RECORDS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "ferry_buffer_corrupt_records_total",
        "Total number of store envelopes skipped during iteration"
    )
    .expect("Failed to register corrupt_records_total metric")
});

static BUFFER_DEPTH: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "ferry_buffer_depth",
        "Number of records currently in the buffer"
    )
    .expect("Failed to register buffer_depth metric")
});

static DRAIN_TICKS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ferry_buffer_drain_ticks_total",
        "Total drain ticks by outcome",
        &["outcome"]
    )
    .expect("Failed to register drain_ticks metric")
});

static DRAIN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "ferry_buffer_drain_duration_seconds",
        "Duration of drain ticks in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register drain_duration metric")
});

// =============================================================================
// Recording Functions
// =============================================================================

/// Records a successful enqueue.
pub fn inc_enqueued() {
    RECORDS_ENQUEUED_TOTAL.inc();
}

/// Records a successful replay.
pub fn inc_applied() {
    RECORDS_APPLIED_TOTAL.inc();
}

/// Records a requeue after a failed apply.
pub fn inc_requeued() {
    RECORDS_REQUEUED_TOTAL.inc();
}

/// Records a drop after retry exhaustion.
pub fn inc_dropped() {
    RECORDS_DROPPED_TOTAL.inc();
}

/// Records a poison-record drop.
pub fn inc_poison() {
    POISON_RECORDS_TOTAL.inc();
}

/// Records a corrupted store envelope skipped during iteration.
pub fn inc_corrupt() {
    CORRUPT_RECORDS_TOTAL.inc();
}

/// Publishes the current buffer depth.
pub fn set_depth(depth: u64) {
    BUFFER_DEPTH.set(depth as f64);
}

/// Records a drain tick outcome (`completed`, `skipped_offline`,
/// `timed_out`).
pub fn inc_drain_tick(outcome: &str) {
    DRAIN_TICKS.with_label_values(&[outcome]).inc();
}

/// Records the duration of a drain tick.
pub fn observe_drain_duration(seconds: f64) {
    DRAIN_DURATION.observe(seconds);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_register_and_increment() {
        let before = RECORDS_ENQUEUED_TOTAL.get();
        inc_enqueued();
        assert!(RECORDS_ENQUEUED_TOTAL.get() >= before + 1.0);
    }

    #[test]
    fn test_depth_gauge() {
        set_depth(17);
        assert_eq!(BUFFER_DEPTH.get(), 17.0);
    }

    #[test]
    fn test_tick_outcomes_are_labelled() {
        inc_drain_tick("completed");
        inc_drain_tick("skipped_offline");
        let completed = DRAIN_TICKS.with_label_values(&["completed"]).get();
        assert!(completed >= 1.0);
    }
}
