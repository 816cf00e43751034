//! Carrier pass-through handlers: catalog, quotes, tracking and carrier-side
//! pre-posting lookups.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use postagem_core::carrier::{
    CarrierListFilter, CarrierPrePosting, CarrierPrePostingPage, DeliveryAction, QuoteRequest,
    ServiceInfo, ServiceQuote, ShippingService, TokenStatus, TrackingResult,
};

use super::error::{bad_request, carrier_error, not_found, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceInfo>,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub destination_postal_code: String,
    pub quotes: Vec<ServiceQuote>,
}

#[derive(Debug, Deserialize)]
pub struct TrackManyRequest {
    pub codes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TrackManyResponse {
    pub results: Vec<TrackingResult>,
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuspendRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/carrier/services
pub async fn list_services() -> Json<ServicesResponse> {
    Json(ServicesResponse {
        services: ShippingService::ALL.into_iter().map(ServiceInfo::from).collect(),
    })
}

/// GET /api/v1/carrier/auth
///
/// Token expiry and postage card; refreshes the token when needed.
pub async fn token_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TokenStatus>, ApiError> {
    state
        .carrier()
        .token_status()
        .await
        .map(Json)
        .map_err(carrier_error)
}

/// POST /api/v1/carrier/quote
pub async fn quote(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>, ApiError> {
    if request.destination_postal_code.trim().is_empty() {
        return Err(bad_request("destination_postal_code is required"));
    }

    let quotes = state.carrier().quote(&request).await;
    Ok(Json(QuoteResponse {
        destination_postal_code: request.destination_postal_code,
        quotes,
    }))
}

/// GET /api/v1/carrier/tracking/{code}
pub async fn track(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Json<TrackingResult> {
    Json(state.carrier().track(&code).await)
}

/// POST /api/v1/carrier/tracking
///
/// Up to 50 codes; a bad code is flagged in its own entry.
pub async fn track_many(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TrackManyRequest>,
) -> Result<Json<TrackManyResponse>, ApiError> {
    let results = state
        .carrier()
        .track_many(&body.codes)
        .await
        .map_err(carrier_error)?;
    Ok(Json(TrackManyResponse {
        count: results.len(),
        results,
    }))
}

/// POST /api/v1/carrier/tracking/{code}/suspend
pub async fn suspend_delivery(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    body: Option<Json<SuspendRequest>>,
) -> Result<Json<DeliveryAction>, ApiError> {
    let reason = body.and_then(|Json(b)| b.reason);
    state
        .carrier()
        .suspend_delivery(&code, reason.as_deref())
        .await
        .map(Json)
        .map_err(carrier_error)
}

/// POST /api/v1/carrier/tracking/{code}/reactivate
pub async fn reactivate_delivery(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<DeliveryAction>, ApiError> {
    state
        .carrier()
        .reactivate_delivery(&code)
        .await
        .map(Json)
        .map_err(carrier_error)
}

/// GET /api/v1/carrier/pre-postings
pub async fn list_carrier_pre_postings(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<CarrierListFilter>,
) -> Result<Json<CarrierPrePostingPage>, ApiError> {
    state
        .carrier()
        .list_pre_postings(&filter)
        .await
        .map(Json)
        .map_err(carrier_error)
}

/// GET /api/v1/carrier/pre-postings/{id}
pub async fn get_carrier_pre_posting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CarrierPrePosting>, ApiError> {
    match state.carrier().get_pre_posting(&id).await {
        Ok(Some(posting)) => Ok(Json(posting)),
        Ok(None) => Err(not_found(format!("Carrier pre-posting not found: {}", id))),
        Err(e) => Err(carrier_error(e)),
    }
}

/// GET /api/v1/carrier/posted/{code}
pub async fn get_posted(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<CarrierPrePosting>, ApiError> {
    match state.carrier().get_posted(&code).await {
        Ok(Some(posting)) => Ok(Json(posting)),
        Ok(None) => Err(not_found(format!("Posted object not found: {}", code))),
        Err(e) => Err(carrier_error(e)),
    }
}
