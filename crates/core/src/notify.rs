//! Customer notifications.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::orders::{ReturnRequest, ReturnStatus};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Sends messages to customers.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError>;

    /// Tell the customer their return moved to `status`.
    async fn return_status_changed(
        &self,
        ret: &ReturnRequest,
        status: ReturnStatus,
    ) -> Result<(), NotifyError> {
        let subject = format!("Devolucao #{}: {}", ret.id, status.display_name());
        let mut body = format!(
            "Ola {}, sua devolucao #{} foi atualizada: {}.",
            ret.customer_name,
            ret.id,
            status.display_name()
        );
        if let Some(code) = ret.shipment.as_ref().and_then(|s| s.tracking_code.as_deref()) {
            body.push_str(&format!(" Codigo de rastreio: {}.", code));
        }
        self.send(&ret.customer_email, &subject, &body).await
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(recipient = %recipient, subject = %subject, body = %body, "Notification");
        Ok(())
    }
}
