//! Shipping work triggered when an order is paid.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::carrier::ShippingService;
use crate::label::{Label, LabelError, LabelFilter, LabelManager};
use crate::preposting::{CreatePrePostingRequest, PrePosting, PrePostingManager};
use crate::print_queue::{
    PrintQueue, PrintQueueError, PrintQueueFilter, PrintQueueItem, PrintStatus,
};

const LABEL_LOOKUP_LIMIT: u32 = 100;

/// What happened to each step of a dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub order_id: i64,
    pub pre_posting: Option<PrePosting>,
    pub label: Option<Label>,
    /// The carrier was still rendering the label when polling stopped.
    pub label_pending: bool,
    pub print_item: Option<PrintQueueItem>,
    pub errors: Vec<String>,
}

impl DispatchOutcome {
    fn new(order_id: i64) -> Self {
        Self {
            order_id,
            pre_posting: None,
            label: None,
            label_pending: false,
            print_item: None,
            errors: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.print_item.is_some()
    }
}

/// Pre-posting, then label, then print queue.
pub struct OrderDispatcher {
    pre_postings: Arc<PrePostingManager>,
    labels: Arc<LabelManager>,
    print_queue: Arc<PrintQueue>,
}

impl OrderDispatcher {
    pub fn new(
        pre_postings: Arc<PrePostingManager>,
        labels: Arc<LabelManager>,
        print_queue: Arc<PrintQueue>,
    ) -> Self {
        Self {
            pre_postings,
            labels,
            print_queue,
        }
    }

    /// Run every shipping step for a paid order.
    ///
    /// Safe to call again: the active pre-posting and its label are reused,
    /// and a label is queued only while it has no pending, claimed or
    /// printed item.
    pub async fn on_order_paid(&self, order_id: i64) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::new(order_id);

        let request = CreatePrePostingRequest::new(order_id, ShippingService::Sedex.code());
        let posting = match self.pre_postings.create(request).await {
            Ok(posting) => posting,
            Err(e) => {
                warn!(order_id, error = %e, "Dispatch: pre-posting failed");
                outcome.errors.push(format!("pre-posting: {}", e));
                return outcome;
            }
        };

        let existing = match self.label_for_posting(&posting) {
            Ok(existing) => existing,
            Err(e) => {
                warn!(order_id, error = %e, "Dispatch: label lookup failed");
                outcome.errors.push(format!("label lookup: {}", e));
                outcome.pre_posting = Some(posting);
                return outcome;
            }
        };
        outcome.pre_posting = Some(posting);

        let label = match existing {
            Some(label) => {
                info!(order_id, receipt_id = %label.receipt_id, "Dispatch: label already generated");
                label
            }
            None => match self.labels.generate_for_order(order_id).await {
                Ok(Some(label)) => label,
                Ok(None) => {
                    info!(order_id, "Dispatch: label still rendering, poll it later");
                    outcome.label_pending = true;
                    return outcome;
                }
                Err(e) => {
                    warn!(order_id, error = %e, "Dispatch: label generation failed");
                    outcome.errors.push(format!("label: {}", e));
                    return outcome;
                }
            },
        };

        match self.live_print_item(label.id) {
            Ok(Some(item)) => {
                info!(order_id, item_id = item.id, status = %item.status, "Dispatch: label already queued");
            }
            Ok(None) => match self.print_queue.enqueue(&label, Some(order_id), None, None) {
                Ok(item) => outcome.print_item = Some(item),
                Err(e) => {
                    warn!(order_id, error = %e, "Dispatch: enqueue failed");
                    outcome.errors.push(format!("print queue: {}", e));
                }
            },
            Err(e) => {
                warn!(order_id, error = %e, "Dispatch: print queue lookup failed");
                outcome.errors.push(format!("print queue: {}", e));
            }
        }
        outcome.label = Some(label);

        info!(
            order_id,
            complete = outcome.is_complete(),
            "Dispatch finished"
        );
        outcome
    }

    /// Stored label generated for this pre-posting, if any.
    fn label_for_posting(&self, posting: &PrePosting) -> Result<Option<Label>, LabelError> {
        let filter = LabelFilter::default()
            .with_order(posting.order_id)
            .with_page(1, LABEL_LOOKUP_LIMIT);
        let page = self.labels.list(&filter)?;
        Ok(page.items.into_iter().find(|label| {
            let by_id = posting
                .carrier_id
                .as_ref()
                .is_some_and(|id| label.pre_posting_ids.contains(id));
            let by_code = posting
                .tracking_code
                .as_ref()
                .is_some_and(|code| label.tracking_codes.contains(code));
            by_id || by_code
        }))
    }

    fn live_print_item(&self, label_id: i64) -> Result<Option<PrintQueueItem>, PrintQueueError> {
        let filter = PrintQueueFilter::default()
            .with_label(label_id)
            .with_page(1, LABEL_LOOKUP_LIMIT);
        let page = self.print_queue.list(&filter)?;
        Ok(page.items.into_iter().find(|item| {
            matches!(
                item.status,
                PrintStatus::Pending | PrintStatus::InProgress | PrintStatus::Printed
            )
        }))
    }
}
