use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::{carrier, dispatch, handlers, labels, pre_postings, print_queue};
use super::middleware::metrics_middleware;
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Stored label documents, served under the prefix recorded on each label
    let label_prefix = state
        .config()
        .labels
        .public_prefix
        .trim_end_matches('/')
        .to_string();
    let label_dir = state.config().labels.storage_dir.clone();

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Carrier
        .route("/carrier/services", get(carrier::list_services))
        .route("/carrier/auth", get(carrier::token_status))
        .route("/carrier/quote", post(carrier::quote))
        .route("/carrier/tracking", post(carrier::track_many))
        .route("/carrier/tracking/{code}", get(carrier::track))
        .route("/carrier/tracking/{code}/suspend", post(carrier::suspend_delivery))
        .route("/carrier/tracking/{code}/reactivate", post(carrier::reactivate_delivery))
        .route("/carrier/pre-postings", get(carrier::list_carrier_pre_postings))
        .route("/carrier/pre-postings/{id}", get(carrier::get_carrier_pre_posting))
        .route("/carrier/posted/{code}", get(carrier::get_posted))
        // Pre-postings
        .route("/pre-postings", post(pre_postings::create_pre_posting))
        .route("/pre-postings", get(pre_postings::list_pre_postings))
        .route("/pre-postings/reconcile", post(pre_postings::reconcile))
        .route("/pre-postings/{id}", get(pre_postings::get_pre_posting))
        .route("/pre-postings/{id}/cancel", post(pre_postings::cancel_pre_posting))
        .route("/returns/{id}/pre-posting", post(pre_postings::create_return_pre_posting))
        // Labels
        .route("/labels", get(labels::list_labels))
        .route("/labels/jobs", post(labels::submit_job))
        .route("/labels/jobs/{receipt}/poll", post(labels::poll_job))
        .route("/labels/{receipt}", get(labels::get_label))
        .route("/labels/{receipt}", delete(labels::delete_label))
        .route("/labels/{receipt}/pdf", get(labels::download_label))
        // Print queue
        .route("/print-queue", post(print_queue::enqueue))
        .route("/print-queue", get(print_queue::list_items))
        .route("/print-queue/pending", get(print_queue::list_pending))
        .route("/print-queue/{id}", get(print_queue::get_item))
        .route("/print-queue/{id}/reserve", post(print_queue::reserve))
        .route("/print-queue/{id}/confirm", post(print_queue::confirm))
        .route("/print-queue/{id}/fail", post(print_queue::fail))
        .route("/print-queue/{id}/cancel", post(print_queue::cancel))
        .route("/print-queue/{id}/file", get(print_queue::download_file))
        // Orders
        .route("/orders/{id}/pre-posting", get(pre_postings::get_order_pre_posting))
        .route("/orders/{id}/label", post(labels::generate_order_label))
        .route("/orders/{id}/dispatch", post(dispatch::dispatch_order))
        .with_state(Arc::clone(&state));

    let mut router = Router::new()
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .nest("/api/v1", api_routes);

    if label_prefix.starts_with('/') && label_prefix.len() > 1 {
        router = router.nest_service(&label_prefix, ServeDir::new(label_dir));
    }

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
