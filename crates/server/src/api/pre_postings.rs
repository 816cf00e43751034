//! Local pre-posting handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::info;
use postagem_core::orders::ReturnRequest;
use postagem_core::preposting::{PrePostingFilter, PrePostingPage};
use postagem_core::{
    CreatePrePostingRequest, PrePosting, PrePostingStatus, ReconcileSummary,
};

use super::error::{bad_request, not_found, pre_posting_error, ApiError};
use crate::state::AppState;

/// Default page size for listings
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Maximum page size for listings
const MAX_PAGE_SIZE: u32 = 200;

/// Query parameters for listing pre-postings
#[derive(Debug, Deserialize)]
pub struct ListPrePostingsParams {
    pub status: Option<String>,
    /// First creation day, inclusive (yyyy-mm-dd)
    pub from: Option<NaiveDate>,
    /// Last creation day, inclusive (yyyy-mm-dd)
    pub to: Option<NaiveDate>,
    pub order_id: Option<i64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    date.and_time(last).and_utc()
}

/// POST /api/v1/pre-postings
///
/// Returns the order's active pre-posting instead of creating a second one.
pub async fn create_pre_posting(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreatePrePostingRequest>,
) -> Result<(StatusCode, Json<PrePosting>), ApiError> {
    state
        .pre_postings()
        .create(request)
        .await
        .map(|posting| (StatusCode::CREATED, Json(posting)))
        .map_err(pre_posting_error)
}

/// GET /api/v1/pre-postings
pub async fn list_pre_postings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListPrePostingsParams>,
) -> Result<Json<PrePostingPage>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let mut filter = PrePostingFilter::new()
        .with_page(page, page_size)
        .with_created_range(params.from.map(start_of_day), params.to.map(end_of_day));

    if let Some(ref status) = params.status {
        let status = PrePostingStatus::parse(status)
            .ok_or_else(|| bad_request(format!("Unknown status: {}", status)))?;
        filter = filter.with_status(status);
    }

    if let Some(order_id) = params.order_id {
        filter = filter.with_order(order_id);
    }

    state
        .pre_postings()
        .list(&filter)
        .map(Json)
        .map_err(pre_posting_error)
}

/// GET /api/v1/pre-postings/{id}
pub async fn get_pre_posting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<PrePosting>, ApiError> {
    match state.pre_postings().get(id) {
        Ok(Some(posting)) => Ok(Json(posting)),
        Ok(None) => Err(not_found(format!("Pre-posting not found: {}", id))),
        Err(e) => Err(pre_posting_error(e)),
    }
}

/// GET /api/v1/orders/{id}/pre-posting
///
/// The active pre-posting of an order, else its most recent one.
pub async fn get_order_pre_posting(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
) -> Result<Json<PrePosting>, ApiError> {
    match state.pre_postings().get_by_order(order_id) {
        Ok(Some(posting)) => Ok(Json(posting)),
        Ok(None) => Err(not_found(format!(
            "Order {} has no pre-posting",
            order_id
        ))),
        Err(e) => Err(pre_posting_error(e)),
    }
}

/// POST /api/v1/pre-postings/{id}/cancel
pub async fn cancel_pre_posting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<PrePosting>, ApiError> {
    let posting = state
        .pre_postings()
        .cancel(id)
        .await
        .map_err(pre_posting_error)?;
    info!(pre_posting_id = id, "Pre-posting cancelled via API");
    Ok(Json(posting))
}

/// POST /api/v1/returns/{id}/pre-posting
pub async fn create_return_pre_posting(
    State(state): State<Arc<AppState>>,
    Path(return_id): Path<i64>,
) -> Result<(StatusCode, Json<ReturnRequest>), ApiError> {
    state
        .pre_postings()
        .create_reverse(return_id)
        .await
        .map(|ret| (StatusCode::CREATED, Json(ret)))
        .map_err(pre_posting_error)
}

/// POST /api/v1/pre-postings/reconcile
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReconcileSummary>, ApiError> {
    state
        .reconciler()
        .reconcile_all()
        .await
        .map(Json)
        .map_err(pre_posting_error)
}
