//! Print queue handlers.
//!
//! Printing workers poll `/print-queue/pending`, reserve an item, fetch its
//! file and then confirm or fail it.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use postagem_core::print_queue::{EnqueueRequest, PrintQueueFilter, PrintQueuePage};
use postagem_core::{PrintQueueItem, PrintStatus};

use super::error::{bad_request, label_error, not_found, print_queue_error, ApiError};
use crate::state::AppState;

/// Default page size for listings
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Maximum page size for listings
const MAX_PAGE_SIZE: u32 = 200;

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PendingParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ListPrintQueueParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub worker: String,
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/print-queue
pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<PrintQueueItem>), ApiError> {
    let label = match state.labels().get(&body.receipt_id) {
        Ok(Some(label)) => label,
        Ok(None) => return Err(not_found(format!("Label not found: {}", body.receipt_id))),
        Err(e) => return Err(label_error(e)),
    };

    state
        .print_queue()
        .enqueue(&label, body.order_id, body.printer, body.copies)
        .map(|item| (StatusCode::CREATED, Json(item)))
        .map_err(print_queue_error)
}

/// GET /api/v1/print-queue/pending
///
/// Oldest pending items first.
pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PendingParams>,
) -> Result<Json<Vec<PrintQueueItem>>, ApiError> {
    state
        .print_queue()
        .list_pending(params.limit)
        .map(Json)
        .map_err(print_queue_error)
}

/// GET /api/v1/print-queue
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListPrintQueueParams>,
) -> Result<Json<PrintQueuePage>, ApiError> {
    let page = params.page.unwrap_or(1);
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let mut filter = PrintQueueFilter::default().with_page(page, page_size);
    if let Some(ref status) = params.status {
        let status = PrintStatus::parse(status)
            .ok_or_else(|| bad_request(format!("Unknown status: {}", status)))?;
        filter = filter.with_status(status);
    }

    state
        .print_queue()
        .list(&filter)
        .map(Json)
        .map_err(print_queue_error)
}

/// GET /api/v1/print-queue/{id}
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<PrintQueueItem>, ApiError> {
    match state.print_queue().get(id) {
        Ok(Some(item)) => Ok(Json(item)),
        Ok(None) => Err(not_found(format!("Print queue item not found: {}", id))),
        Err(e) => Err(print_queue_error(e)),
    }
}

/// POST /api/v1/print-queue/{id}/reserve
pub async fn reserve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<ReserveRequest>,
) -> Result<Json<PrintQueueItem>, ApiError> {
    if body.worker.trim().is_empty() {
        return Err(bad_request("worker is required"));
    }
    state
        .print_queue()
        .reserve(id, body.worker.trim())
        .map(Json)
        .map_err(print_queue_error)
}

/// POST /api/v1/print-queue/{id}/confirm
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<PrintQueueItem>, ApiError> {
    state
        .print_queue()
        .confirm(id)
        .map(Json)
        .map_err(print_queue_error)
}

/// POST /api/v1/print-queue/{id}/fail
pub async fn fail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<FailRequest>,
) -> Result<Json<PrintQueueItem>, ApiError> {
    state
        .print_queue()
        .fail(id, &body.error)
        .map(Json)
        .map_err(print_queue_error)
}

/// POST /api/v1/print-queue/{id}/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<PrintQueueItem>, ApiError> {
    state
        .print_queue()
        .cancel(id)
        .map(Json)
        .map_err(print_queue_error)
}

/// GET /api/v1/print-queue/{id}/file
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let (item, bytes) = state
        .print_queue()
        .file(id)
        .await
        .map_err(print_queue_error)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", item.file_name),
            ),
        ],
        bytes,
    ))
}
