//! Prometheus metrics for the queue core.
//!
//! Registered by the server through [`all_metrics`].

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Ticket numbering
// =============================================================================

/// Tickets issued, by service.
pub static TICKETS_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queuedesk_tickets_created_total", "Total tickets issued"),
        &["service_id"],
    )
    .unwrap()
});

/// Allocation attempts that had to be retried, by cause.
pub static ALLOCATION_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "queuedesk_allocation_retries_total",
            "Ticket number allocation attempts retried",
        ),
        &["cause"], // "label_taken", "transient"
    )
    .unwrap()
});

/// Allocations that exhausted their retry budget.
pub static ALLOCATION_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "queuedesk_allocation_failures_total",
        "Ticket number allocations that gave up",
    )
    .unwrap()
});

/// Attempts needed per successful allocation.
pub static ALLOCATION_ATTEMPTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "queuedesk_allocation_attempts",
            "Attempts needed to allocate a ticket number",
        )
        .buckets(vec![1.0, 2.0, 3.0, 5.0, 8.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Lifecycle
// =============================================================================

/// Transitions by kind and result.
pub static TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queuedesk_transitions_total", "Ticket transitions attempted"),
        &["transition", "result"], // result: "applied", "noop", "rejected"
    )
    .unwrap()
});

/// Rejected operations by conflict reason.
pub static CONFLICTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("queuedesk_conflicts_total", "Operations rejected by a guard"),
        &["reason"],
    )
    .unwrap()
});

pub static TRANSFERS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("queuedesk_transfers_total", "Tickets transferred").unwrap()
});

/// Seconds between dispatch and completion.
pub static ATTENTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "queuedesk_attention_duration_seconds",
            "Time a ticket spent in attention before finishing",
        )
        .buckets(vec![30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 3600.0]),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Cashiers
// =============================================================================

/// Cashier operational state changes by kind.
pub static CASHIER_STATE_CHANGES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "queuedesk_cashier_state_changes_total",
            "Cashier pause / out-of-service / resume calls applied",
        ),
        &["change"],
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TICKETS_CREATED.clone()),
        Box::new(ALLOCATION_RETRIES.clone()),
        Box::new(ALLOCATION_FAILURES.clone()),
        Box::new(ALLOCATION_ATTEMPTS.clone()),
        Box::new(TRANSITIONS.clone()),
        Box::new(CONFLICTS.clone()),
        Box::new(TRANSFERS.clone()),
        Box::new(ATTENTION_DURATION.clone()),
        Box::new(CASHIER_STATE_CHANGES.clone()),
    ]
}
