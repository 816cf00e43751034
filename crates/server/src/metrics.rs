//! Prometheus metrics for the HTTP server.
//!
//! Request metrics are recorded by [`crate::api::middleware::metrics_middleware`];
//! queue and pre-posting gauges are refreshed from the stores on every scrape.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use postagem_core::preposting::{PrePostingFilter, PrePostingStatus};
use postagem_core::print_queue::PrintQueueFilter;
use postagem_core::PrintStatus;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "postagem_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("postagem_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "postagem_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Store gauges (collected dynamically)
// =============================================================================

/// Local pre-postings by status.
pub static PRE_POSTINGS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("postagem_pre_postings_by_status", "Pre-postings by status"),
        &["status"],
    )
    .unwrap()
});

/// Print queue items by status.
pub static PRINT_QUEUE_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("postagem_print_queue_by_status", "Print queue items by status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Stores
    registry
        .register(Box::new(PRE_POSTINGS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(PRINT_QUEUE_BY_STATUS.clone()))
        .unwrap();

    // Carrier, managers, queue
    for metric in postagem_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh the store gauges before a scrape.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    for status in PrePostingStatus::ALL {
        let filter = PrePostingFilter::new().with_status(status).with_page(1, 1);
        if let Ok(page) = state.pre_postings().list(&filter) {
            PRE_POSTINGS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(page.total_count);
        }
    }

    for status in PrintStatus::ALL {
        let filter = PrintQueueFilter::default()
            .with_status(status)
            .with_page(1, 1);
        if let Ok(page) = state.print_queue().list(&filter) {
            PRINT_QUEUE_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(page.total_count);
        }
    }
}

/// Normalize a path for metric labels (replace ids and codes with placeholders).
pub fn normalize_path(path: &str) -> String {
    let tracking_regex = regex_lite::Regex::new(r"/[A-Za-z]{2}\d{9}[A-Za-z]{2}(/|$)").unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = tracking_regex.replace_all(path, "/{code}$1");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}
