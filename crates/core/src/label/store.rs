use thiserror::Error;

use crate::carrier::CarrierError;
use crate::preposting::PrePostingError;

use super::{Label, LabelFilter, NewLabel};

/// Errors from label operations.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Carrier error: {0}")]
    Carrier(#[from] CarrierError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Order {0} has no generated pre-posting")]
    PrePostingNotReady(i64),

    #[error("Label job {receipt_id} failed: {message}")]
    JobFailed { receipt_id: String, message: String },

    #[error("Label not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Pre-posting error: {0}")]
    PrePosting(#[from] PrePostingError),

    #[error("Database error: {0}")]
    Database(String),
}

/// Persistence for label metadata.
pub trait LabelStore: Send + Sync {
    /// Insert a label, or return the one already stored for its receipt.
    ///
    /// The flag is true when this call created the row.
    fn insert_or_get(&self, new: &NewLabel) -> Result<(Label, bool), LabelError>;

    fn get(&self, id: i64) -> Result<Option<Label>, LabelError>;

    fn get_by_receipt(&self, receipt_id: &str) -> Result<Option<Label>, LabelError>;

    /// Newest first.
    fn list(&self, filter: &LabelFilter) -> Result<Vec<Label>, LabelError>;

    fn count(&self, filter: &LabelFilter) -> Result<i64, LabelError>;

    /// Returns false when no row matched.
    fn delete(&self, id: i64) -> Result<bool, LabelError>;
}
