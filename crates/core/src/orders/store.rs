use thiserror::Error;

use super::{Order, ReturnRequest, ReturnShipment};

/// Error type for order book access.
#[derive(Debug, Error)]
pub enum OrderBookError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Read access to orders and returns, plus the write-backs shipping owns.
pub trait OrderBook: Send + Sync {
    fn get_order(&self, id: i64) -> Result<Option<Order>, OrderBookError>;

    /// Record the tracking code of the order's shipment.
    fn set_tracking_code(&self, order_id: i64, tracking_code: &str) -> Result<(), OrderBookError>;

    fn get_return(&self, id: i64) -> Result<Option<ReturnRequest>, OrderBookError>;

    /// Store carrier data on a return and mark its label as issued.
    fn record_return_shipment(
        &self,
        return_id: i64,
        shipment: &ReturnShipment,
    ) -> Result<ReturnRequest, OrderBookError>;
}
