//! Print queue for label documents.
//!
//! Items move `Pending -> InProgress -> Printed`. A failed print returns the
//! item to `Pending` until it has used all its attempts, then parks it in
//! `Error`.

mod queue;
mod sqlite_store;
mod store;
mod types;

pub use queue::PrintQueue;
pub use sqlite_store::SqlitePrintQueueStore;
pub use store::{PrintQueueError, PrintQueueStore};
pub use types::*;
