//! Shipment pre-postings: creation, lookup, listing and cancellation.

mod manager;
pub mod payload;
mod sqlite_store;
mod store;
mod types;

pub use manager::PrePostingManager;
pub use sqlite_store::SqlitePrePostingStore;
pub use store::{PrePostingError, PrePostingStore};
pub use types::*;
