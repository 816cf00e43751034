//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Carrier API calls and token refreshes
//! - Pre-posting creation and cancellation
//! - Label jobs and the print queue
//! - Status reconciliation

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Carrier Metrics
// =============================================================================

/// Carrier API requests by operation and outcome.
pub static CARRIER_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("postagem_carrier_requests_total", "Carrier API requests"),
        &["operation", "outcome"], // outcome: "success", "http_error", or an error kind
    )
    .unwrap()
});

/// Carrier API latency in seconds.
pub static CARRIER_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "postagem_carrier_request_duration_seconds",
            "Carrier API request duration",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .unwrap()
});

/// Token refreshes by result.
pub static TOKEN_REFRESHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("postagem_token_refreshes_total", "Carrier token refreshes"),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Pre-posting Metrics
// =============================================================================

/// Pre-postings created by kind ("forward", "reverse").
pub static PRE_POSTINGS_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("postagem_pre_postings_created_total", "Pre-postings created"),
        &["kind"],
    )
    .unwrap()
});

/// Pre-postings cancelled locally.
pub static PRE_POSTINGS_CANCELLED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "postagem_pre_postings_cancelled_total",
        "Pre-postings cancelled",
    )
    .unwrap()
});

// =============================================================================
// Label Metrics
// =============================================================================

/// Label polls by outcome ("ready", "pending", "failed", "cached").
pub static LABEL_POLLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("postagem_label_polls_total", "Label job polls"),
        &["outcome"],
    )
    .unwrap()
});

/// Label documents persisted.
pub static LABELS_STORED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("postagem_labels_stored_total", "Label documents stored").unwrap()
});

// =============================================================================
// Print Queue Metrics
// =============================================================================

/// Print queue transitions ("enqueued", "reserved", "printed", "failed", "exhausted", "cancelled").
pub static PRINT_JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("postagem_print_jobs_total", "Print queue transitions"),
        &["transition"],
    )
    .unwrap()
});

// =============================================================================
// Reconciliation Metrics
// =============================================================================

/// Status changes applied by reconciliation, by new status.
pub static RECONCILE_UPDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "postagem_reconcile_updates_total",
            "Pre-posting status changes from tracking",
        ),
        &["status"],
    )
    .unwrap()
});

/// Tracking lookups that failed during reconciliation.
pub static RECONCILE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "postagem_reconcile_failures_total",
        "Tracking failures skipped during reconciliation",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Carrier
        Box::new(CARRIER_REQUESTS.clone()),
        Box::new(CARRIER_REQUEST_DURATION.clone()),
        Box::new(TOKEN_REFRESHES.clone()),
        // Pre-postings
        Box::new(PRE_POSTINGS_CREATED.clone()),
        Box::new(PRE_POSTINGS_CANCELLED.clone()),
        // Labels
        Box::new(LABEL_POLLS.clone()),
        Box::new(LABELS_STORED.clone()),
        // Print queue
        Box::new(PRINT_JOBS.clone()),
        // Reconciliation
        Box::new(RECONCILE_UPDATES.clone()),
        Box::new(RECONCILE_FAILURES.clone()),
    ]
}
