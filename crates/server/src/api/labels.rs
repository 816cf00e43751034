//! Label job and document handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use postagem_core::carrier::LabelReceipt;
use postagem_core::label::{LabelFilter, LabelPage};
use postagem_core::{Label, LabelJobContext, LabelOutcome};

use super::error::{label_error, not_found, ApiError};
use crate::state::AppState;

/// Default page size for listings
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Maximum page size for listings
const MAX_PAGE_SIZE: u32 = 200;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListLabelsParams {
    pub order_id: Option<i64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct OrderLabelResponse {
    pub order_id: i64,
    pub label: Option<Label>,
    /// The carrier is still rendering; poll the job again later.
    pub pending: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/labels/jobs
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    Json(context): Json<LabelJobContext>,
) -> Result<(StatusCode, Json<LabelReceipt>), ApiError> {
    state
        .labels()
        .submit(&context)
        .await
        .map(|receipt| (StatusCode::ACCEPTED, Json(receipt)))
        .map_err(label_error)
}

/// POST /api/v1/labels/jobs/{receipt}/poll
///
/// The body repeats the job context so the stored label can be correlated
/// with its order. 200 when ready, 202 while rendering, 502 on a carrier
/// failure.
pub async fn poll_job(
    State(state): State<Arc<AppState>>,
    Path(receipt_id): Path<String>,
    body: Option<Json<LabelJobContext>>,
) -> Result<(StatusCode, Json<LabelOutcome>), ApiError> {
    let context = body.map(|Json(c)| c).unwrap_or_default();
    let outcome = state
        .labels()
        .poll(&receipt_id, &context)
        .await
        .map_err(label_error)?;

    let status = match &outcome {
        LabelOutcome::Ready { .. } => StatusCode::OK,
        LabelOutcome::Pending { .. } => StatusCode::ACCEPTED,
        LabelOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
    };
    Ok((status, Json(outcome)))
}

/// GET /api/v1/labels
pub async fn list_labels(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListLabelsParams>,
) -> Result<Json<LabelPage>, ApiError> {
    let page = params.page.unwrap_or(1);
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let mut filter = LabelFilter::default().with_page(page, page_size);
    if let Some(order_id) = params.order_id {
        filter = filter.with_order(order_id);
    }

    state.labels().list(&filter).map(Json).map_err(label_error)
}

/// GET /api/v1/labels/{receipt}
pub async fn get_label(
    State(state): State<Arc<AppState>>,
    Path(receipt_id): Path<String>,
) -> Result<Json<Label>, ApiError> {
    match state.labels().get(&receipt_id) {
        Ok(Some(label)) => Ok(Json(label)),
        Ok(None) => Err(not_found(format!("Label not found: {}", receipt_id))),
        Err(e) => Err(label_error(e)),
    }
}

/// GET /api/v1/labels/{receipt}/pdf
pub async fn download_label(
    State(state): State<Arc<AppState>>,
    Path(receipt_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (label, bytes) = state
        .labels()
        .download(&receipt_id)
        .await
        .map_err(label_error)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", label.file_name),
            ),
        ],
        bytes,
    ))
}

/// DELETE /api/v1/labels/{id}
///
/// Takes the numeric label id and removes both the row and the file.
pub async fn delete_label(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Label>, ApiError> {
    state.labels().delete(id).await.map(Json).map_err(label_error)
}

/// POST /api/v1/orders/{id}/label
///
/// Renders the label of the order's generated pre-posting, polling on the
/// configured schedule.
pub async fn generate_order_label(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
) -> Result<(StatusCode, Json<OrderLabelResponse>), ApiError> {
    let label = state
        .labels()
        .generate_for_order(order_id)
        .await
        .map_err(label_error)?;

    let status = if label.is_some() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((
        status,
        Json(OrderLabelResponse {
            order_id,
            pending: label.is_none(),
            label,
        }),
    ))
}
