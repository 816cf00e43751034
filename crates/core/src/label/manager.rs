//! Label job manager.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::carrier::{Carrier, CarrierError, LabelDownload, LabelReceipt};
use crate::config::LabelConfig;
use crate::db;
use crate::metrics;
use crate::preposting::{PrePostingStatus, PrePostingStore};
use crate::retry::{Attempt, RetryPolicy};

use super::{
    Label, LabelError, LabelFiles, LabelFilter, LabelJobContext, LabelOutcome, LabelPage,
    LabelStore, NewLabel,
};

/// One download attempt, before transient failures are folded into
/// [`LabelOutcome::Failed`].
enum PollStep {
    Outcome(LabelOutcome),
    Transient(CarrierError),
}

/// Submits label jobs, polls them and keeps the rendered documents.
pub struct LabelManager {
    store: Arc<dyn LabelStore>,
    files: LabelFiles,
    carrier: Arc<dyn Carrier>,
    pre_postings: Arc<dyn PrePostingStore>,
    config: LabelConfig,
}

impl LabelManager {
    pub fn new(
        store: Arc<dyn LabelStore>,
        carrier: Arc<dyn Carrier>,
        pre_postings: Arc<dyn PrePostingStore>,
        config: LabelConfig,
    ) -> Self {
        Self {
            files: LabelFiles::new(config.storage_dir.clone()),
            store,
            carrier,
            pre_postings,
            config,
        }
    }

    pub fn files(&self) -> &LabelFiles {
        &self.files
    }

    /// Start a rendering job at the carrier.
    pub async fn submit(&self, context: &LabelJobContext) -> Result<LabelReceipt, LabelError> {
        let identification = context
            .identification()
            .map_err(|e| LabelError::Validation(e.to_string()))?;
        let receipt = self
            .carrier
            .submit_label_job(&identification, &context.options)
            .await?;

        info!(
            receipt_id = %receipt.receipt_id,
            order_id = ?context.order_id,
            "Label job submitted"
        );
        Ok(receipt)
    }

    /// Check a job once, storing the document the first time it is ready.
    ///
    /// Carrier failures come back as [`LabelOutcome::Failed`]; only local
    /// storage problems are errors.
    pub async fn poll(
        &self,
        receipt_id: &str,
        context: &LabelJobContext,
    ) -> Result<LabelOutcome, LabelError> {
        match self.poll_step(receipt_id, context).await? {
            PollStep::Outcome(outcome) => Ok(outcome),
            PollStep::Transient(e) => Ok(LabelOutcome::Failed {
                message: e.to_string(),
            }),
        }
    }

    async fn poll_step(
        &self,
        receipt_id: &str,
        context: &LabelJobContext,
    ) -> Result<PollStep, LabelError> {
        if let Some(label) = self.store.get_by_receipt(receipt_id)? {
            metrics::LABEL_POLLS.with_label_values(&["cached"]).inc();
            debug!(receipt_id, "Label already stored");
            return Ok(PollStep::Outcome(LabelOutcome::Ready {
                label,
                cached: true,
            }));
        }

        let download = match self.carrier.download_label(receipt_id).await {
            Ok(download) => download,
            Err(e) => {
                metrics::LABEL_POLLS.with_label_values(&["failed"]).inc();
                warn!(receipt_id, error = %e, transient = e.is_transient(), "Label download failed");
                if e.is_transient() {
                    return Ok(PollStep::Transient(e));
                }
                return Ok(PollStep::Outcome(LabelOutcome::Failed {
                    message: e.to_string(),
                }));
            }
        };

        let outcome = match download {
            LabelDownload::Pending { message } => {
                metrics::LABEL_POLLS.with_label_values(&["pending"]).inc();
                debug!(receipt_id, message = ?message, "Label still rendering");
                LabelOutcome::Pending { message }
            }
            LabelDownload::Ready { bytes, .. } if bytes.is_empty() => {
                metrics::LABEL_POLLS.with_label_values(&["failed"]).inc();
                LabelOutcome::Failed {
                    message: "carrier returned an empty document".to_string(),
                }
            }
            LabelDownload::Ready { bytes, file_name } => {
                metrics::LABEL_POLLS.with_label_values(&["ready"]).inc();
                let (label, created) = self
                    .persist(receipt_id, context, &bytes, file_name)
                    .await?;
                LabelOutcome::Ready {
                    label,
                    cached: !created,
                }
            }
        };
        Ok(PollStep::Outcome(outcome))
    }

    async fn persist(
        &self,
        receipt_id: &str,
        context: &LabelJobContext,
        bytes: &[u8],
        carrier_file_name: Option<String>,
    ) -> Result<(Label, bool), LabelError> {
        let file_name = super::sanitize_file_name(&context.file_name(receipt_id));
        let size_bytes = self.files.write(&file_name, bytes).await?;

        let new = NewLabel {
            receipt_id: receipt_id.to_string(),
            order_id: context.order_id,
            reception_id: context.reception_id.clone(),
            file_path: format!(
                "{}/{}",
                self.config.public_prefix.trim_end_matches('/'),
                file_name
            ),
            file_name,
            page_count: context.page_count(),
            tracking_codes: context.tracking_codes.clone(),
            pre_posting_ids: context.pre_posting_ids.clone(),
            label_type: context.options.label_type.clone(),
            label_format: context.options.label_format.clone(),
            size_bytes,
            notes: carrier_file_name.map(|name| format!("Arquivo original: {}", name)),
        };

        let (label, created) = match self.store.insert_or_get(&new) {
            Ok(stored) => stored,
            Err(e) => {
                self.discard(&new.file_name).await;
                return Err(e);
            }
        };

        if created {
            metrics::LABELS_STORED.inc();
            info!(
                receipt_id,
                order_id = ?label.order_id,
                file = %label.file_name,
                size_bytes = label.size_bytes,
                "Label stored"
            );
        } else if label.file_name != new.file_name {
            // Another poll stored this receipt first, under its own name.
            debug!(receipt_id, file = %new.file_name, kept = %label.file_name, "Dropping duplicate label file");
            self.discard(&new.file_name).await;
        }
        Ok((label, created))
    }

    async fn discard(&self, file_name: &str) {
        if let Err(e) = self.files.remove(file_name).await {
            warn!(file = %file_name, error = %e, "Failed to remove label file");
        }
    }

    /// Render the label of an order's generated pre-posting.
    ///
    /// Polls on the configured schedule. `Ok(None)` means the carrier is still
    /// rendering; the job can be polled later with the same receipt.
    pub async fn generate_for_order(&self, order_id: i64) -> Result<Option<Label>, LabelError> {
        let posting = self
            .pre_postings
            .find_for_order_with_status(order_id, PrePostingStatus::Generated)?
            .ok_or(LabelError::PrePostingNotReady(order_id))?;
        let carrier_id = posting
            .carrier_id
            .clone()
            .ok_or(LabelError::PrePostingNotReady(order_id))?;

        let context = LabelJobContext::for_order(order_id)
            .with_pre_posting_ids(vec![carrier_id])
            .with_tracking_codes(posting.tracking_code.clone().into_iter().collect());
        let receipt = self.submit(&context).await?;

        let policy = RetryPolicy::from_millis(&self.config.poll_delays_ms);
        let last_slot = policy.attempts().saturating_sub(1);
        let receipt_id = receipt.receipt_id.as_str();
        let ctx = &context;
        let result = policy
            .run(|attempt| async move {
                let step: Result<PollStep, LabelError> = self.poll_step(receipt_id, ctx).await;
                step.map(|step| match step {
                    PollStep::Outcome(LabelOutcome::Ready { label, .. }) => Attempt::Done(Ok(label)),
                    PollStep::Outcome(LabelOutcome::Pending { .. }) => Attempt::Retry,
                    PollStep::Outcome(LabelOutcome::Failed { message }) => {
                        Attempt::Done(Err(message))
                    }
                    PollStep::Transient(_) if attempt < last_slot => Attempt::Retry,
                    PollStep::Transient(e) => Attempt::Done(Err(e.to_string())),
                })
            })
            .await?;

        match result {
            Some(Ok(label)) => Ok(Some(label)),
            Some(Err(message)) => Err(LabelError::JobFailed {
                receipt_id: receipt.receipt_id,
                message,
            }),
            None => {
                info!(
                    order_id,
                    receipt_id = %receipt.receipt_id,
                    "Label still rendering after scheduled polls"
                );
                Ok(None)
            }
        }
    }

    pub fn get(&self, receipt_id: &str) -> Result<Option<Label>, LabelError> {
        self.store.get_by_receipt(receipt_id)
    }

    pub fn list(&self, filter: &LabelFilter) -> Result<LabelPage, LabelError> {
        let items = self.store.list(filter)?;
        let total_count = self.store.count(filter)?;
        Ok(LabelPage {
            items,
            total_count,
            page: filter.page,
            page_size: filter.page_size,
            total_pages: db::total_pages(total_count, filter.page_size),
        })
    }

    /// The stored document of a label.
    pub async fn download(&self, receipt_id: &str) -> Result<(Label, Vec<u8>), LabelError> {
        let label = self
            .store
            .get_by_receipt(receipt_id)?
            .ok_or_else(|| LabelError::NotFound(receipt_id.to_string()))?;
        let bytes = self.files.read(&label.file_name).await?;
        Ok((label, bytes))
    }

    /// Remove a label row and its document.
    pub async fn delete(&self, id: i64) -> Result<Label, LabelError> {
        let label = self
            .store
            .get(id)?
            .ok_or_else(|| LabelError::NotFound(id.to_string()))?;

        // A row must never point at a missing file.
        if !self.store.delete(id)? {
            return Err(LabelError::NotFound(id.to_string()));
        }
        match self.files.remove(&label.file_name).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(label_id = id, file = %label.file_name, "Label file already missing")
            }
            Err(e) => {
                warn!(label_id = id, file = %label.file_name, error = %e, "Failed to remove label file")
            }
        }

        info!(label_id = id, receipt_id = %label.receipt_id, "Label deleted");
        Ok(label)
    }
}
