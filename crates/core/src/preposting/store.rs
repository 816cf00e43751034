use thiserror::Error;

use crate::carrier::CarrierError;
use crate::orders::OrderBookError;

use super::{
    NewPrePosting, PrePosting, PrePostingFilter, PrePostingStatus, StatusUpdate,
};

/// Errors from pre-posting operations.
#[derive(Debug, Error)]
pub enum PrePostingError {
    #[error("Pre-posting not found: {0}")]
    NotFound(i64),

    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    #[error("Return request not found: {0}")]
    ReturnNotFound(i64),

    #[error("Order {0} has no delivery address")]
    MissingDeliveryAddress(i64),

    #[error("Pre-posting {id} is {status}, cannot {operation}")]
    InvalidState {
        id: i64,
        status: PrePostingStatus,
        operation: &'static str,
    },

    #[error("Order {0} already has an active pre-posting")]
    AlreadyActive(i64),

    #[error("Carrier error: {0}")]
    Carrier(#[from] CarrierError),

    #[error("Order book error: {0}")]
    Orders(#[from] OrderBookError),

    #[error("Database error: {0}")]
    Database(String),
}

/// Persistence for pre-postings.
pub trait PrePostingStore: Send + Sync {
    /// Insert a new pre-posting. Fails with `AlreadyActive` when the order
    /// already has a non-terminal one.
    fn insert(&self, new: &NewPrePosting) -> Result<PrePosting, PrePostingError>;

    fn get(&self, id: i64) -> Result<Option<PrePosting>, PrePostingError>;

    /// The order's pre-posting that is neither cancelled nor errored.
    fn find_active_for_order(&self, order_id: i64) -> Result<Option<PrePosting>, PrePostingError>;

    /// Most recent pre-posting for the order, in any status.
    fn latest_for_order(&self, order_id: i64) -> Result<Option<PrePosting>, PrePostingError>;

    /// Most recent pre-posting for the order in the given status.
    fn find_for_order_with_status(
        &self,
        order_id: i64,
        status: PrePostingStatus,
    ) -> Result<Option<PrePosting>, PrePostingError>;

    /// Newest first.
    fn list(&self, filter: &PrePostingFilter) -> Result<Vec<PrePosting>, PrePostingError>;

    fn count(&self, filter: &PrePostingFilter) -> Result<i64, PrePostingError>;

    /// Pre-postings with a tracking code still moving through the network.
    fn list_open(&self) -> Result<Vec<PrePosting>, PrePostingError>;

    /// Move a pending or generated pre-posting to cancelled, appending `note`.
    fn mark_cancelled(&self, id: i64, note: &str) -> Result<PrePosting, PrePostingError>;

    /// Apply all updates atomically. Returns the number of rows changed.
    fn apply_status_updates(&self, updates: &[StatusUpdate]) -> Result<usize, PrePostingError>;
}
