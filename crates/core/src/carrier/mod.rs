//! Correios carrier integration.
//!
//! The [`Carrier`] trait is the seam the managers depend on;
//! [`CorreiosClient`] is the HTTP implementation and
//! [`crate::testing::MockCarrier`] the in-memory one.

mod auth;
mod correios;
pub mod format;
mod types;
pub mod wire;

pub use auth::{
    CarrierAuthenticator, CorreiosTokenSource, ShippingToken, TokenCache, TokenSource,
    REFRESH_MARGIN_MINUTES,
};
pub use correios::CorreiosClient;
pub use types::*;
pub use wire::{AdditionalService, DeclaredItem, Party, PartyAddress, PrePostingPayload};

use async_trait::async_trait;

/// Operations offered by the carrier.
#[async_trait]
pub trait Carrier: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Current token status, refreshing it when needed.
    async fn token_status(&self) -> Result<TokenStatus, CarrierError>;

    /// Price and lead time for each requested service. Never fails as a whole.
    async fn quote(&self, request: &QuoteRequest) -> Vec<ServiceQuote>;

    /// Track a single object. Failures come back flagged.
    async fn track(&self, tracking_code: &str) -> TrackingResult;

    /// Track up to [`MAX_TRACKING_BATCH`] objects, one after another.
    async fn track_many(&self, tracking_codes: &[String]) -> Result<Vec<TrackingResult>, CarrierError> {
        if tracking_codes.len() > MAX_TRACKING_BATCH {
            return Err(CarrierError::Validation(format!(
                "at most {} tracking codes per batch, got {}",
                MAX_TRACKING_BATCH,
                tracking_codes.len()
            )));
        }

        let mut results = Vec::with_capacity(tracking_codes.len());
        for code in tracking_codes {
            results.push(self.track(code).await);
        }
        Ok(results)
    }

    /// Register a pre-posting.
    async fn create_pre_posting(
        &self,
        payload: &PrePostingPayload,
    ) -> Result<CreatedPrePosting, CarrierError>;

    /// Look up a pre-posting by carrier id.
    async fn get_pre_posting(
        &self,
        carrier_id: &str,
    ) -> Result<Option<CarrierPrePosting>, CarrierError>;

    /// Look up a posted object by tracking code.
    async fn get_posted(
        &self,
        tracking_code: &str,
    ) -> Result<Option<CarrierPrePosting>, CarrierError>;

    /// Carrier-side listing, paginated by the carrier.
    async fn list_pre_postings(
        &self,
        filter: &CarrierListFilter,
    ) -> Result<CarrierPrePostingPage, CarrierError>;

    /// Cancel a pre-posting upstream.
    async fn cancel_pre_posting(&self, carrier_id: &str) -> Result<(), CarrierError>;

    /// Start an asynchronous label rendering job.
    async fn submit_label_job(
        &self,
        identification: &LabelIdentification,
        options: &LabelOptions,
    ) -> Result<LabelReceipt, CarrierError>;

    /// Fetch the rendered document of a label job, if ready.
    async fn download_label(&self, receipt_id: &str) -> Result<LabelDownload, CarrierError>;

    /// Ask the carrier to hold delivery of an object.
    async fn suspend_delivery(
        &self,
        tracking_code: &str,
        reason: Option<&str>,
    ) -> Result<DeliveryAction, CarrierError>;

    /// Resume a suspended delivery.
    async fn reactivate_delivery(&self, tracking_code: &str) -> Result<DeliveryAction, CarrierError>;
}
