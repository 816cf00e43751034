use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintStatus {
    Pending,
    InProgress,
    Printed,
    Error,
    Cancelled,
}

impl PrintStatus {
    pub const ALL: [PrintStatus; 5] = [
        PrintStatus::Pending,
        PrintStatus::InProgress,
        PrintStatus::Printed,
        PrintStatus::Error,
        PrintStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrintStatus::Pending => "pending",
            PrintStatus::InProgress => "in_progress",
            PrintStatus::Printed => "printed",
            PrintStatus::Error => "error",
            PrintStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PrintStatus::Pending),
            "in_progress" => Some(PrintStatus::InProgress),
            "printed" => Some(PrintStatus::Printed),
            "error" => Some(PrintStatus::Error),
            "cancelled" => Some(PrintStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PrintStatus::Printed | PrintStatus::Error | PrintStatus::Cancelled
        )
    }
}

impl std::fmt::Display for PrintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested print of a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintQueueItem {
    pub id: i64,
    pub label_id: i64,
    pub order_id: Option<i64>,
    /// Customer-facing order code at enqueue time.
    pub order_code: Option<String>,
    pub file_name: String,
    pub file_path: String,
    pub status: PrintStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub printer: Option<String>,
    pub copies: u32,
    /// Worker holding the item while in progress.
    pub claimed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub printed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewPrintItem {
    pub label_id: i64,
    pub order_id: Option<i64>,
    pub order_code: Option<String>,
    pub file_name: String,
    pub file_path: String,
    pub max_attempts: u32,
    pub printer: Option<String>,
    pub copies: u32,
}

/// Enqueue request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    /// Label receipt id.
    pub receipt_id: String,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub printer: Option<String>,
    #[serde(default)]
    pub copies: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct PrintQueueFilter {
    pub status: Option<PrintStatus>,
    pub label_id: Option<i64>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for PrintQueueFilter {
    fn default() -> Self {
        Self {
            status: None,
            label_id: None,
            page: 1,
            page_size: 20,
        }
    }
}

impl PrintQueueFilter {
    pub fn with_status(mut self, status: PrintStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_label(mut self, label_id: i64) -> Self {
        self.label_id = Some(label_id);
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
pub struct PrintQueuePage {
    pub items: Vec<PrintQueueItem>,
    pub total_count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}
