//! Orders and returns owned by the storefront.
//!
//! The shipping code only reads them and writes back tracking data.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteOrderBook;
pub use store::{OrderBook, OrderBookError};
pub use types::*;
