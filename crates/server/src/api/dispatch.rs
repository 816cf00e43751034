use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;
use postagem_core::DispatchOutcome;

use crate::state::AppState;

/// POST /api/v1/orders/{id}/dispatch
///
/// Runs the paid-order shipping flow. Step failures are reported in the
/// outcome body rather than as an error status.
pub async fn dispatch_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
) -> Json<DispatchOutcome> {
    let outcome = state.dispatcher().on_order_paid(order_id).await;
    info!(
        order_id,
        complete = outcome.is_complete(),
        label_pending = outcome.label_pending,
        "Order dispatch requested"
    );
    Json(outcome)
}
