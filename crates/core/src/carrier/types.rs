//! Carrier-facing types shared by the client, the managers and the HTTP layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when talking to the carrier.
#[derive(Debug, Clone, Error)]
pub enum CarrierError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Carrier API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Malformed carrier response (HTTP {status}): {reason}")]
    MalformedResponse { status: u16, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl CarrierError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CarrierError::Authentication(_) => "authentication",
            CarrierError::Api { .. } => "api",
            CarrierError::MalformedResponse { .. } => "malformed",
            CarrierError::Validation(_) => "validation",
            CarrierError::Timeout => "timeout",
            CarrierError::ConnectionFailed(_) => "connection",
        }
    }

    /// The carrier was unreachable or failed on its side; asking again may work.
    pub fn is_transient(&self) -> bool {
        match self {
            CarrierError::Timeout | CarrierError::ConnectionFailed(_) => true,
            CarrierError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Most tracking codes a single batch lookup accepts.
pub const MAX_TRACKING_BATCH: usize = 50;

/// Services offered when a quote names none.
pub const DEFAULT_QUOTE_SERVICES: [&str; 2] = ["03220", "03298"];

/// Correios services the store ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingService {
    Sedex,
    Pac,
    Sedex10,
    Sedex12,
    SedexHoje,
}

impl ShippingService {
    pub const ALL: [ShippingService; 5] = [
        ShippingService::Sedex,
        ShippingService::Pac,
        ShippingService::Sedex10,
        ShippingService::Sedex12,
        ShippingService::SedexHoje,
    ];

    /// Contract service code.
    pub fn code(&self) -> &'static str {
        match self {
            ShippingService::Sedex => "03220",
            ShippingService::Pac => "03298",
            ShippingService::Sedex10 => "03140",
            ShippingService::Sedex12 => "03204",
            ShippingService::SedexHoje => "03158",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ShippingService::Sedex => "SEDEX",
            ShippingService::Pac => "PAC",
            ShippingService::Sedex10 => "SEDEX 10",
            ShippingService::Sedex12 => "SEDEX 12",
            ShippingService::SedexHoje => "SEDEX Hoje",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ShippingService::Sedex => "Expressa",
            ShippingService::Pac => "Economica",
            ShippingService::Sedex10 => "Entrega ate as 10h do dia util seguinte",
            ShippingService::Sedex12 => "Entrega ate as 12h do dia util seguinte",
            ShippingService::SedexHoje => "Entrega no mesmo dia",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code.trim())
    }
}

/// Display name for a service code, `Desconhecido` when unknown.
pub fn service_name(code: &str) -> &'static str {
    ShippingService::from_code(code)
        .map(|s| s.display_name())
        .unwrap_or("Desconhecido")
}

/// Service catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl From<ShippingService> for ServiceInfo {
    fn from(service: ShippingService) -> Self {
        Self {
            code: service.code(),
            name: service.display_name(),
            description: service.description(),
        }
    }
}

/// Physical package attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    #[serde(default = "default_weight")]
    pub weight_kg: Decimal,
    #[serde(default = "default_height")]
    pub height_cm: u32,
    #[serde(default = "default_width")]
    pub width_cm: u32,
    #[serde(default = "default_length")]
    pub length_cm: u32,
}

impl Default for Package {
    fn default() -> Self {
        Self {
            weight_kg: default_weight(),
            height_cm: default_height(),
            width_cm: default_width(),
            length_cm: default_length(),
        }
    }
}

fn default_weight() -> Decimal {
    Decimal::new(3, 1)
}

fn default_height() -> u32 {
    5
}

fn default_width() -> u32 {
    15
}

fn default_length() -> u32 {
    20
}

/// Price and lead-time quote request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    /// Falls back to the store's postal code.
    #[serde(default)]
    pub origin_postal_code: Option<String>,
    pub destination_postal_code: String,
    /// Empty means [`DEFAULT_QUOTE_SERVICES`].
    #[serde(default)]
    pub service_codes: Vec<String>,
    #[serde(flatten)]
    pub package: Package,
    /// Cart being quoted, used to correlate the carrier lot.
    #[serde(default)]
    pub cart_id: Option<i64>,
}

impl QuoteRequest {
    pub fn new(destination_postal_code: impl Into<String>) -> Self {
        Self {
            origin_postal_code: None,
            destination_postal_code: destination_postal_code.into(),
            service_codes: Vec::new(),
            package: Package::default(),
            cart_id: None,
        }
    }

    pub fn with_services(mut self, codes: &[&str]) -> Self {
        self.service_codes = codes.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Requested services, or the defaults.
    pub fn services(&self) -> Vec<String> {
        if self.service_codes.is_empty() {
            DEFAULT_QUOTE_SERVICES.iter().map(|c| c.to_string()).collect()
        } else {
            self.service_codes.clone()
        }
    }
}

/// Quote for a single service. `error` marks a partial failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceQuote {
    pub service_code: String,
    pub service_name: String,
    pub price: Option<Decimal>,
    pub delivery_days: Option<u32>,
    pub max_delivery_date: Option<String>,
    pub error: bool,
    pub message: Option<String>,
}

/// One tracking event, newest first in [`TrackingResult::events`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub occurred_at: Option<DateTime<Utc>>,
    pub description: String,
    pub event_type: String,
    pub unit: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

/// Tracking lookup outcome. Failures are flagged, not raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingResult {
    pub tracking_code: String,
    pub postal_type: Option<String>,
    pub events: Vec<TrackingEvent>,
    pub error: bool,
    pub message: Option<String>,
}

impl TrackingResult {
    pub fn failed(tracking_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tracking_code: tracking_code.into(),
            postal_type: None,
            events: Vec::new(),
            error: true,
            message: Some(message.into()),
        }
    }

    /// The most recent event.
    pub fn latest(&self) -> Option<&TrackingEvent> {
        self.events.first()
    }
}

/// Carrier answer to a successful pre-posting creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedPrePosting {
    pub carrier_id: String,
    pub tracking_code: Option<String>,
    pub label_number: Option<String>,
    pub posting_deadline: Option<DateTime<Utc>>,
    /// Raw response body
    pub raw: String,
}

/// Party summary as reported by the carrier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartySummary {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub postal_code: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

/// A pre-posting as stored on the carrier side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CarrierPrePosting {
    pub carrier_id: Option<String>,
    pub correlation_id: Option<String>,
    pub tracking_code: Option<String>,
    pub service_code: Option<String>,
    pub service_name: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub posted_at: Option<String>,
    pub weight_kg: Option<Decimal>,
    pub height_cm: Option<Decimal>,
    pub width_cm: Option<Decimal>,
    pub length_cm: Option<Decimal>,
    pub service_price: Option<Decimal>,
    pub sender: Option<PartySummary>,
    pub recipient: Option<PartySummary>,
}

/// Filters for the carrier-side pre-posting listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarrierListFilter {
    pub carrier_id: Option<String>,
    pub tracking_code: Option<String>,
    pub correlation_id: Option<String>,
    pub status: Option<String>,
    pub reverse: Option<String>,
    pub object_type: Option<String>,
    pub payment_mode: Option<String>,
    pub created_from: Option<chrono::NaiveDate>,
    pub created_to: Option<chrono::NaiveDate>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl CarrierListFilter {
    /// Query pairs in the carrier's parameter names.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let mut push = |key: &'static str, value: &Option<String>| {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                pairs.push((key, v.to_string()));
            }
        };
        push("id", &self.carrier_id);
        push("codigoObjeto", &self.tracking_code);
        push("idCorreios", &self.correlation_id);
        push("status", &self.status);
        push("logisticaReversa", &self.reverse);
        push("tipoObjeto", &self.object_type);
        push("modalidadePagamento", &self.payment_mode);
        if let Some(from) = self.created_from {
            pairs.push((
                "dataInicialCriacaoPrePostagem",
                from.format("%Y-%m-%d").to_string(),
            ));
        }
        if let Some(to) = self.created_to {
            pairs.push((
                "dataFinalCriacaoPrePostagem",
                to.format("%Y-%m-%d").to_string(),
            ));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(size) = self.size {
            pairs.push(("size", size.to_string()));
        }
        pairs
    }
}

/// One page of the carrier-side listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CarrierPrePostingPage {
    pub items: Vec<CarrierPrePosting>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub first: bool,
    pub last: bool,
}

/// How a label job names the objects to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum LabelIdentification {
    Reception(String),
    PrePostingIds(Vec<String>),
    TrackingCodes(Vec<String>),
}

impl LabelIdentification {
    /// Pick one mode from loosely supplied inputs.
    ///
    /// Precedence is reception id, then pre-posting ids, then tracking codes.
    pub fn from_parts(
        reception_id: Option<String>,
        pre_posting_ids: Vec<String>,
        tracking_codes: Vec<String>,
    ) -> Result<Self, CarrierError> {
        if let Some(reception) = reception_id.filter(|r| !r.trim().is_empty()) {
            return Ok(Self::Reception(reception));
        }
        let ids: Vec<String> = pre_posting_ids
            .into_iter()
            .filter(|i| !i.trim().is_empty())
            .collect();
        if !ids.is_empty() {
            return Ok(Self::PrePostingIds(ids));
        }
        let codes: Vec<String> = tracking_codes
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect();
        if !codes.is_empty() {
            return Ok(Self::TrackingCodes(codes));
        }
        Err(CarrierError::Validation(
            "a reception id, pre-posting ids or tracking codes are required".to_string(),
        ))
    }
}

/// Rendering options for a label job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelOptions {
    #[serde(default = "default_label_type")]
    pub label_type: String,
    #[serde(default = "default_label_format")]
    pub label_format: String,
    #[serde(default = "default_print_sender")]
    pub print_sender: String,
    #[serde(default = "default_layout")]
    pub layout: String,
}

impl Default for LabelOptions {
    fn default() -> Self {
        Self {
            label_type: default_label_type(),
            label_format: default_label_format(),
            print_sender: default_print_sender(),
            layout: default_layout(),
        }
    }
}

fn default_label_type() -> String {
    "P".to_string()
}

fn default_label_format() -> String {
    "ET".to_string()
}

fn default_print_sender() -> String {
    "S".to_string()
}

fn default_layout() -> String {
    "PADRAO".to_string()
}

/// Receipt for a submitted label job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelReceipt {
    pub receipt_id: String,
}

/// Outcome of a label download attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelDownload {
    /// Document rendered.
    Ready {
        bytes: Vec<u8>,
        file_name: Option<String>,
    },
    /// Still rendering.
    Pending { message: Option<String> },
}

/// Acknowledgement of a delivery suspension or reactivation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryAction {
    pub tracking_code: String,
    pub accepted: bool,
    pub raw: String,
}

/// Token status without the secret itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenStatus {
    pub expires_at: DateTime<Utc>,
    pub postage_card: String,
    pub contract: Option<String>,
}
