//! Pre-posting domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::carrier::{Package, ShippingService};

/// Lifecycle of a pre-posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrePostingStatus {
    Pending,
    Generated,
    Posted,
    InTransit,
    Delivered,
    ReturnedToSender,
    Cancelled,
    Error,
}

impl PrePostingStatus {
    pub const ALL: [PrePostingStatus; 8] = [
        PrePostingStatus::Pending,
        PrePostingStatus::Generated,
        PrePostingStatus::Posted,
        PrePostingStatus::InTransit,
        PrePostingStatus::Delivered,
        PrePostingStatus::ReturnedToSender,
        PrePostingStatus::Cancelled,
        PrePostingStatus::Error,
    ];

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrePostingStatus::Pending => "pending",
            PrePostingStatus::Generated => "generated",
            PrePostingStatus::Posted => "posted",
            PrePostingStatus::InTransit => "in_transit",
            PrePostingStatus::Delivered => "delivered",
            PrePostingStatus::ReturnedToSender => "returned_to_sender",
            PrePostingStatus::Cancelled => "cancelled",
            PrePostingStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Label for operators.
    pub fn display_name(&self) -> &'static str {
        match self {
            PrePostingStatus::Pending => "Pending",
            PrePostingStatus::Generated => "Generated",
            PrePostingStatus::Posted => "Posted",
            PrePostingStatus::InTransit => "In transit",
            PrePostingStatus::Delivered => "Delivered",
            PrePostingStatus::ReturnedToSender => "Returned to sender",
            PrePostingStatus::Cancelled => "Cancelled",
            PrePostingStatus::Error => "Error",
        }
    }

    /// Counts toward the one-active-posting-per-order rule.
    pub fn is_active(&self) -> bool {
        !matches!(self, PrePostingStatus::Cancelled | PrePostingStatus::Error)
    }

    /// Still moving through the carrier network.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            PrePostingStatus::Generated | PrePostingStatus::Posted | PrePostingStatus::InTransit
        )
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, PrePostingStatus::Pending | PrePostingStatus::Generated)
    }
}

impl std::fmt::Display for PrePostingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A carrier shipment for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrePosting {
    pub id: i64,
    pub order_id: i64,
    /// Id assigned by the carrier.
    pub carrier_id: Option<String>,
    pub tracking_code: Option<String>,
    pub label_number: Option<String>,
    pub service_code: String,
    pub service_name: String,
    pub weight_kg: Decimal,
    pub height_cm: u32,
    pub width_cm: u32,
    pub length_cm: u32,
    pub declared_value: Option<Decimal>,
    pub status: PrePostingStatus,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub posting_deadline: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub error_message: Option<String>,
    /// Raw carrier response, kept for audit.
    pub carrier_response: Option<String>,
}

impl PrePosting {
    pub fn package(&self) -> Package {
        Package {
            weight_kg: self.weight_kg,
            height_cm: self.height_cm,
            width_cm: self.width_cm,
            length_cm: self.length_cm,
        }
    }
}

/// Row to insert.
#[derive(Debug, Clone)]
pub struct NewPrePosting {
    pub order_id: i64,
    pub carrier_id: Option<String>,
    pub tracking_code: Option<String>,
    pub label_number: Option<String>,
    pub service_code: String,
    pub service_name: String,
    pub package: Package,
    pub declared_value: Option<Decimal>,
    pub status: PrePostingStatus,
    pub posting_deadline: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub carrier_response: Option<String>,
}

/// Request to ship an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrePostingRequest {
    pub order_id: i64,
    #[serde(default = "default_service_code")]
    pub service_code: String,
    #[serde(default)]
    pub weight_kg: Option<Decimal>,
    #[serde(default)]
    pub height_cm: Option<u32>,
    #[serde(default)]
    pub width_cm: Option<u32>,
    #[serde(default)]
    pub length_cm: Option<u32>,
    #[serde(default)]
    pub declared_value: Option<Decimal>,
}

fn default_service_code() -> String {
    ShippingService::Sedex.code().to_string()
}

impl CreatePrePostingRequest {
    pub fn new(order_id: i64, service_code: impl Into<String>) -> Self {
        Self {
            order_id,
            service_code: service_code.into(),
            weight_kg: None,
            height_cm: None,
            width_cm: None,
            length_cm: None,
            declared_value: None,
        }
    }

    /// Requested package, with defaults for anything left out.
    pub fn package(&self) -> Package {
        let defaults = Package::default();
        Package {
            weight_kg: self.weight_kg.unwrap_or(defaults.weight_kg),
            height_cm: self.height_cm.unwrap_or(defaults.height_cm),
            width_cm: self.width_cm.unwrap_or(defaults.width_cm),
            length_cm: self.length_cm.unwrap_or(defaults.length_cm),
        }
    }
}

/// Filter for the local listing.
#[derive(Debug, Clone)]
pub struct PrePostingFilter {
    pub status: Option<PrePostingStatus>,
    pub order_id: Option<i64>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for PrePostingFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl PrePostingFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            order_id: None,
            created_from: None,
            created_to: None,
            page: 1,
            page_size: 20,
        }
    }

    pub fn with_status(mut self, status: PrePostingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_created_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_from = from;
        self.created_to = to;
        self
    }

    pub fn with_page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page.max(1);
        self.page_size = page_size.max(1);
        self
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.page_size as i64
    }
}

/// One page of pre-postings.
#[derive(Debug, Clone, Serialize)]
pub struct PrePostingPage {
    pub items: Vec<PrePosting>,
    pub total_count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// A status change produced by reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub id: i64,
    pub status: PrePostingStatus,
    pub posted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}
