//! Print queue service.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PrintQueueConfig;
use crate::db;
use crate::label::{Label, LabelFiles};
use crate::metrics;
use crate::orders::OrderBook;

use super::{
    NewPrintItem, PrintQueueError, PrintQueueFilter, PrintQueueItem, PrintQueuePage,
    PrintQueueStore,
};

pub struct PrintQueue {
    store: Arc<dyn PrintQueueStore>,
    orders: Arc<dyn OrderBook>,
    files: LabelFiles,
    config: PrintQueueConfig,
}

impl PrintQueue {
    pub fn new(
        store: Arc<dyn PrintQueueStore>,
        orders: Arc<dyn OrderBook>,
        files: LabelFiles,
        config: PrintQueueConfig,
    ) -> Self {
        Self {
            store,
            orders,
            files,
            config,
        }
    }

    /// Queue a label for printing.
    ///
    /// The order code is looked up for the operator's benefit; a missing order
    /// does not block printing.
    pub fn enqueue(
        &self,
        label: &Label,
        order_id: Option<i64>,
        printer: Option<String>,
        copies: Option<u32>,
    ) -> Result<PrintQueueItem, PrintQueueError> {
        let order_id = order_id.or(label.order_id);
        let order_code = match order_id {
            Some(id) => match self.orders.get_order(id) {
                Ok(order) => order.map(|o| o.code),
                Err(e) => {
                    warn!(order_id = id, error = %e, "Failed to look up order for print item");
                    None
                }
            },
            None => None,
        };

        let item = self.store.insert(&NewPrintItem {
            label_id: label.id,
            order_id,
            order_code,
            file_name: label.file_name.clone(),
            file_path: label.file_path.clone(),
            max_attempts: self.config.max_attempts,
            printer,
            copies: copies.unwrap_or(1).max(1),
        })?;

        metrics::PRINT_JOBS.with_label_values(&["enqueued"]).inc();
        info!(
            print_item_id = item.id,
            label_id = label.id,
            order_id = ?item.order_id,
            "Label queued for printing"
        );
        Ok(item)
    }

    /// Oldest pending items, up to `limit` or the configured batch.
    pub fn list_pending(&self, limit: Option<u32>) -> Result<Vec<PrintQueueItem>, PrintQueueError> {
        self.store
            .list_pending(limit.unwrap_or(self.config.pending_batch).max(1))
    }

    pub fn list(&self, filter: &PrintQueueFilter) -> Result<PrintQueuePage, PrintQueueError> {
        let items = self.store.list(filter)?;
        let total_count = self.store.count(filter)?;
        Ok(PrintQueuePage {
            items,
            total_count,
            page: filter.page,
            page_size: filter.page_size,
            total_pages: db::total_pages(total_count, filter.page_size),
        })
    }

    pub fn get(&self, id: i64) -> Result<Option<PrintQueueItem>, PrintQueueError> {
        self.store.get(id)
    }

    pub fn reserve(&self, id: i64, worker: &str) -> Result<PrintQueueItem, PrintQueueError> {
        let item = self.store.reserve(id, worker)?;
        metrics::PRINT_JOBS.with_label_values(&["reserved"]).inc();
        info!(print_item_id = id, worker = %worker, "Print item reserved");
        Ok(item)
    }

    pub fn confirm(&self, id: i64) -> Result<PrintQueueItem, PrintQueueError> {
        let item = self.store.confirm(id)?;
        metrics::PRINT_JOBS.with_label_values(&["printed"]).inc();
        info!(print_item_id = id, "Print item printed");
        Ok(item)
    }

    pub fn fail(&self, id: i64, error: &str) -> Result<PrintQueueItem, PrintQueueError> {
        let item = self.store.fail(id, error)?;
        let transition = if item.status.is_terminal() {
            warn!(
                print_item_id = id,
                attempts = item.attempts,
                error = %error,
                "Print item exhausted its attempts"
            );
            "exhausted"
        } else {
            info!(print_item_id = id, attempts = item.attempts, error = %error, "Print attempt failed");
            "failed"
        };
        metrics::PRINT_JOBS.with_label_values(&[transition]).inc();
        Ok(item)
    }

    pub fn cancel(&self, id: i64) -> Result<PrintQueueItem, PrintQueueError> {
        let item = self.store.cancel(id)?;
        metrics::PRINT_JOBS.with_label_values(&["cancelled"]).inc();
        info!(print_item_id = id, "Print item cancelled");
        Ok(item)
    }

    /// The document backing an item.
    pub async fn file(&self, id: i64) -> Result<(PrintQueueItem, Vec<u8>), PrintQueueError> {
        let item = self.store.get(id)?.ok_or(PrintQueueError::NotFound(id))?;
        let bytes = self.files.read(&item.file_name).await?;
        Ok((item, bytes))
    }
}
