use thiserror::Error;

use crate::label::LabelError;
use crate::orders::OrderBookError;

use super::{NewPrintItem, PrintQueueFilter, PrintQueueItem, PrintStatus};

#[derive(Debug, Error)]
pub enum PrintQueueError {
    #[error("Print queue item not found: {0}")]
    NotFound(i64),

    #[error("Label not found: {0}")]
    LabelNotFound(String),

    #[error("Print queue item {id} is {status}, cannot {operation}")]
    InvalidState {
        id: i64,
        status: PrintStatus,
        operation: &'static str,
    },

    #[error("Label error: {0}")]
    Label(#[from] LabelError),

    #[error("Order book error: {0}")]
    Orders(#[from] OrderBookError),

    #[error("Database error: {0}")]
    Database(String),
}

/// Persistence and state transitions for print queue items.
///
/// Every transition is a single conditional update, so two workers can never
/// both win the same item.
pub trait PrintQueueStore: Send + Sync {
    fn insert(&self, new: &NewPrintItem) -> Result<PrintQueueItem, PrintQueueError>;

    fn get(&self, id: i64) -> Result<Option<PrintQueueItem>, PrintQueueError>;

    /// Pending items, oldest first.
    fn list_pending(&self, limit: u32) -> Result<Vec<PrintQueueItem>, PrintQueueError>;

    /// Newest first.
    fn list(&self, filter: &PrintQueueFilter) -> Result<Vec<PrintQueueItem>, PrintQueueError>;

    fn count(&self, filter: &PrintQueueFilter) -> Result<i64, PrintQueueError>;

    /// Pending -> InProgress.
    fn reserve(&self, id: i64, worker: &str) -> Result<PrintQueueItem, PrintQueueError>;

    /// InProgress -> Printed.
    fn confirm(&self, id: i64) -> Result<PrintQueueItem, PrintQueueError>;

    /// Count an attempt; back to Pending, or Error once attempts run out.
    fn fail(&self, id: i64, error: &str) -> Result<PrintQueueItem, PrintQueueError>;

    /// Pending or InProgress -> Cancelled.
    fn cancel(&self, id: i64) -> Result<PrintQueueItem, PrintQueueError>;
}
