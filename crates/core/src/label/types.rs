//! Label domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::carrier::{CarrierError, LabelIdentification, LabelOptions};

/// A rendered label document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: i64,
    /// Carrier job receipt; unique per generation job.
    pub receipt_id: String,
    pub order_id: Option<i64>,
    pub reception_id: Option<String>,
    pub file_name: String,
    /// Public path the document is served under.
    pub file_path: String,
    pub generated_at: DateTime<Utc>,
    pub page_count: u32,
    pub tracking_codes: Vec<String>,
    pub pre_posting_ids: Vec<String>,
    pub label_type: String,
    pub label_format: String,
    pub size_bytes: u64,
    pub notes: Option<String>,
}

/// Row to insert.
#[derive(Debug, Clone)]
pub struct NewLabel {
    pub receipt_id: String,
    pub order_id: Option<i64>,
    pub reception_id: Option<String>,
    pub file_name: String,
    pub file_path: String,
    pub page_count: u32,
    pub tracking_codes: Vec<String>,
    pub pre_posting_ids: Vec<String>,
    pub label_type: String,
    pub label_format: String,
    pub size_bytes: u64,
    pub notes: Option<String>,
}

/// What a label job is for. Sent when submitting and again when polling,
/// since the carrier does not echo it back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelJobContext {
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub reception_id: Option<String>,
    #[serde(default)]
    pub pre_posting_ids: Vec<String>,
    #[serde(default)]
    pub tracking_codes: Vec<String>,
    #[serde(default)]
    pub options: LabelOptions,
}

impl LabelJobContext {
    pub fn for_order(order_id: i64) -> Self {
        Self {
            order_id: Some(order_id),
            ..Default::default()
        }
    }

    pub fn with_pre_posting_ids(mut self, ids: Vec<String>) -> Self {
        self.pre_posting_ids = ids;
        self
    }

    pub fn with_tracking_codes(mut self, codes: Vec<String>) -> Self {
        self.tracking_codes = codes;
        self
    }

    pub fn with_reception(mut self, reception_id: impl Into<String>) -> Self {
        self.reception_id = Some(reception_id.into());
        self
    }

    /// How the carrier should find the objects to render.
    pub fn identification(&self) -> Result<LabelIdentification, CarrierError> {
        LabelIdentification::from_parts(
            self.reception_id.clone(),
            self.pre_posting_ids.clone(),
            self.tracking_codes.clone(),
        )
    }

    /// One page per tracking code, else per pre-posting id, else one.
    pub fn page_count(&self) -> u32 {
        if !self.tracking_codes.is_empty() {
            self.tracking_codes.len() as u32
        } else if !self.pre_posting_ids.is_empty() {
            self.pre_posting_ids.len() as u32
        } else {
            1
        }
    }

    /// Stored file name for a receipt.
    pub fn file_name(&self, receipt_id: &str) -> String {
        match self.order_id {
            Some(order_id) => format!("label_order_{}_{}.pdf", order_id, receipt_id),
            None => format!("label_{}.pdf", receipt_id),
        }
    }
}

/// Result of polling a label job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LabelOutcome {
    Ready {
        label: Label,
        /// The label was already stored by an earlier poll.
        cached: bool,
    },
    Pending {
        message: Option<String>,
    },
    Failed {
        message: String,
    },
}

/// Filter for the label listing.
#[derive(Debug, Clone)]
pub struct LabelFilter {
    pub order_id: Option<i64>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for LabelFilter {
    fn default() -> Self {
        Self {
            order_id: None,
            page: 1,
            page_size: 20,
        }
    }
}

impl LabelFilter {
    pub fn with_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
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

#[derive(Debug, Clone, Serialize)]
pub struct LabelPage {
    pub items: Vec<Label>,
    pub total_count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}
