//! Carrier label jobs: submission, polling, storage and retrieval.

mod files;
mod manager;
mod sqlite_store;
mod store;
mod types;

pub use files::{sanitize_file_name, LabelFiles};
pub use manager::LabelManager;
pub use sqlite_store::SqliteLabelStore;
pub use store::{LabelError, LabelStore};
pub use types::*;
