//! Mock carrier for testing.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;

use crate::carrier::{
    service_name, Carrier, CarrierError, CarrierListFilter, CarrierPrePosting,
    CarrierPrePostingPage, CreatedPrePosting, DeliveryAction, LabelDownload, LabelIdentification,
    LabelOptions, LabelReceipt, PartySummary, PrePostingPayload, QuoteRequest, ServiceQuote,
    TokenStatus, TrackingResult,
};

use super::fixtures::SAMPLE_PDF;

/// A call made against the mock, for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum CarrierCall {
    Quote(QuoteRequest),
    Track(String),
    CreatePrePosting(PrePostingPayload),
    GetPrePosting(String),
    GetPosted(String),
    ListPrePostings,
    CancelPrePosting(String),
    SubmitLabelJob(LabelIdentification),
    DownloadLabel(String),
    SuspendDelivery(String),
    ReactivateDelivery(String),
}

/// In-memory implementation of the [`Carrier`] trait.
///
/// - Every created pre-posting gets a fresh carrier id and tracking code
/// - Tracking returns whatever was configured per code
/// - Label downloads replay a queued sequence of results, then succeed with a sample PDF
/// - `fail_next` makes the next fallible call return an error
///
/// ```rust,ignore
/// let carrier = MockCarrier::new();
/// carrier.push_label_download(LabelDownload::Pending { message: None }).await;
/// carrier.set_tracking(fixtures::tracking_result("AA000000001BR", &[("BDE", "Objeto entregue")])).await;
/// ```
#[derive(Debug)]
pub struct MockCarrier {
    calls: Arc<RwLock<Vec<CarrierCall>>>,
    next_error: Arc<RwLock<Option<CarrierError>>>,
    tracking: Arc<RwLock<HashMap<String, TrackingResult>>>,
    quotes: Arc<RwLock<HashMap<String, ServiceQuote>>>,
    label_downloads: Arc<RwLock<VecDeque<Result<LabelDownload, CarrierError>>>>,
    create_delay: Arc<RwLock<Option<StdDuration>>>,
    pre_postings: Arc<RwLock<Vec<CarrierPrePosting>>>,
    tracking_codes: Arc<RwLock<VecDeque<String>>>,
    sequence: AtomicU64,
}

impl Default for MockCarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCarrier {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            tracking: Arc::new(RwLock::new(HashMap::new())),
            quotes: Arc::new(RwLock::new(HashMap::new())),
            label_downloads: Arc::new(RwLock::new(VecDeque::new())),
            create_delay: Arc::new(RwLock::new(None)),
            pre_postings: Arc::new(RwLock::new(Vec::new())),
            tracking_codes: Arc::new(RwLock::new(VecDeque::new())),
            sequence: AtomicU64::new(0),
        }
    }

    /// Make the next fallible call fail with `error`.
    pub async fn fail_next(&self, error: CarrierError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn set_tracking(&self, result: TrackingResult) {
        self.tracking
            .write()
            .await
            .insert(result.tracking_code.clone(), result);
    }

    pub async fn set_quote(&self, quote: ServiceQuote) {
        self.quotes
            .write()
            .await
            .insert(quote.service_code.clone(), quote);
    }

    /// Tracking code for the next created pre-posting instead of a generated one.
    pub async fn push_tracking_code(&self, code: impl Into<String>) {
        self.tracking_codes.write().await.push_back(code.into());
    }

    /// Queue the result of a future `download_label` call.
    pub async fn push_label_download(&self, download: LabelDownload) {
        self.label_downloads.write().await.push_back(Ok(download));
    }

    /// Queue a failed label download.
    pub async fn push_label_failure(&self, error: CarrierError) {
        self.label_downloads.write().await.push_back(Err(error));
    }

    /// Hold every pre-posting creation for `delay` before answering.
    pub async fn delay_creates(&self, delay: StdDuration) {
        *self.create_delay.write().await = Some(delay);
    }

    pub async fn calls(&self) -> Vec<CarrierCall> {
        self.calls.read().await.clone()
    }

    pub async fn created_payloads(&self) -> Vec<PrePostingPayload> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                CarrierCall::CreatePrePosting(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn create_count(&self) -> usize {
        self.created_payloads().await.len()
    }

    pub async fn cancelled_ids(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                CarrierCall::CancelPrePosting(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn download_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| matches!(c, CarrierCall::DownloadLabel(_)))
            .count()
    }

    async fn record(&self, call: CarrierCall) {
        self.calls.write().await.push(call);
    }

    async fn take_error(&self) -> Result<(), CarrierError> {
        match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn party_summary(party: &crate::carrier::Party) -> PartySummary {
    PartySummary {
        name: Some(party.name.clone()),
        tax_id: Some(party.tax_id.clone()),
        phone: Some(format!("{}{}", party.area_code, party.phone)),
        email: Some(party.email.clone()),
        postal_code: Some(party.address.postal_code.clone()),
        street: Some(party.address.street.clone()),
        number: Some(party.address.number.clone()),
        complement: party.address.complement.clone(),
        neighborhood: Some(party.address.neighborhood.clone()),
        city: Some(party.address.city.clone()),
        state: Some(party.address.state.clone()),
    }
}

#[async_trait]
impl Carrier for MockCarrier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn token_status(&self) -> Result<TokenStatus, CarrierError> {
        self.take_error().await?;
        Ok(TokenStatus {
            expires_at: Utc::now() + Duration::hours(1),
            postage_card: "0076543210".to_string(),
            contract: Some("9912345678".to_string()),
        })
    }

    async fn quote(&self, request: &QuoteRequest) -> Vec<ServiceQuote> {
        self.record(CarrierCall::Quote(request.clone())).await;
        let configured = self.quotes.read().await;
        request
            .services()
            .into_iter()
            .map(|code| {
                configured.get(&code).cloned().unwrap_or_else(|| ServiceQuote {
                    service_name: service_name(&code).to_string(),
                    service_code: code,
                    price: Some(Decimal::new(2590, 2)),
                    delivery_days: Some(3),
                    max_delivery_date: None,
                    error: false,
                    message: None,
                })
            })
            .collect()
    }

    async fn track(&self, tracking_code: &str) -> TrackingResult {
        self.record(CarrierCall::Track(tracking_code.to_string())).await;
        self.tracking
            .read()
            .await
            .get(tracking_code)
            .cloned()
            .unwrap_or_else(|| TrackingResult::failed(tracking_code, "Objeto nao encontrado"))
    }

    async fn create_pre_posting(
        &self,
        payload: &PrePostingPayload,
    ) -> Result<CreatedPrePosting, CarrierError> {
        self.record(CarrierCall::CreatePrePosting(payload.clone())).await;
        self.take_error().await?;
        let delay = *self.create_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let n = self.next_id();
        let carrier_id = format!("PP{:06}", n);
        let tracking_code = self
            .tracking_codes
            .write()
            .await
            .pop_front()
            .unwrap_or_else(|| format!("AA{:09}BR", n));

        self.pre_postings.write().await.push(CarrierPrePosting {
            carrier_id: Some(carrier_id.clone()),
            correlation_id: Some(payload.correlation_id.clone()),
            tracking_code: Some(tracking_code.clone()),
            service_code: Some(payload.service_code.clone()),
            service_name: Some(service_name(&payload.service_code).to_string()),
            status: Some("PREATENDIDO".to_string()),
            created_at: Some(Utc::now().to_rfc3339()),
            sender: Some(party_summary(&payload.sender)),
            recipient: Some(party_summary(&payload.recipient)),
            ..Default::default()
        });

        Ok(CreatedPrePosting {
            carrier_id: carrier_id.clone(),
            tracking_code: Some(tracking_code.clone()),
            label_number: Some(format!("ET{:06}", n)),
            posting_deadline: Some(Utc::now() + Duration::days(7)),
            raw: format!(
                r#"{{"id":"{}","codigoObjeto":"{}"}}"#,
                carrier_id, tracking_code
            ),
        })
    }

    async fn get_pre_posting(
        &self,
        carrier_id: &str,
    ) -> Result<Option<CarrierPrePosting>, CarrierError> {
        self.record(CarrierCall::GetPrePosting(carrier_id.to_string())).await;
        self.take_error().await?;
        Ok(self
            .pre_postings
            .read()
            .await
            .iter()
            .find(|p| p.carrier_id.as_deref() == Some(carrier_id))
            .cloned())
    }

    async fn get_posted(
        &self,
        tracking_code: &str,
    ) -> Result<Option<CarrierPrePosting>, CarrierError> {
        self.record(CarrierCall::GetPosted(tracking_code.to_string())).await;
        self.take_error().await?;
        Ok(self
            .pre_postings
            .read()
            .await
            .iter()
            .find(|p| p.tracking_code.as_deref() == Some(tracking_code))
            .cloned())
    }

    async fn list_pre_postings(
        &self,
        filter: &CarrierListFilter,
    ) -> Result<CarrierPrePostingPage, CarrierError> {
        self.record(CarrierCall::ListPrePostings).await;
        self.take_error().await?;
        let items: Vec<CarrierPrePosting> = self
            .pre_postings
            .read()
            .await
            .iter()
            .filter(|p| {
                filter
                    .tracking_code
                    .as_deref()
                    .map_or(true, |code| p.tracking_code.as_deref() == Some(code))
            })
            .cloned()
            .collect();
        Ok(CarrierPrePostingPage {
            total_elements: items.len() as u64,
            total_pages: 1,
            first: true,
            last: true,
            items,
        })
    }

    async fn cancel_pre_posting(&self, carrier_id: &str) -> Result<(), CarrierError> {
        self.record(CarrierCall::CancelPrePosting(carrier_id.to_string())).await;
        self.take_error().await
    }

    async fn submit_label_job(
        &self,
        identification: &LabelIdentification,
        _options: &LabelOptions,
    ) -> Result<LabelReceipt, CarrierError> {
        self.record(CarrierCall::SubmitLabelJob(identification.clone())).await;
        self.take_error().await?;
        Ok(LabelReceipt {
            receipt_id: format!("REC{:06}", self.next_id()),
        })
    }

    async fn download_label(&self, receipt_id: &str) -> Result<LabelDownload, CarrierError> {
        self.record(CarrierCall::DownloadLabel(receipt_id.to_string())).await;
        self.take_error().await?;
        self.label_downloads
            .write()
            .await
            .pop_front()
            .unwrap_or_else(|| {
                Ok(LabelDownload::Ready {
                    bytes: SAMPLE_PDF.to_vec(),
                    file_name: None,
                })
            })
    }

    async fn suspend_delivery(
        &self,
        tracking_code: &str,
        _reason: Option<&str>,
    ) -> Result<DeliveryAction, CarrierError> {
        self.record(CarrierCall::SuspendDelivery(tracking_code.to_string())).await;
        self.take_error().await?;
        Ok(DeliveryAction {
            tracking_code: tracking_code.to_string(),
            accepted: true,
            raw: "{}".to_string(),
        })
    }

    async fn reactivate_delivery(&self, tracking_code: &str) -> Result<DeliveryAction, CarrierError> {
        self.record(CarrierCall::ReactivateDelivery(tracking_code.to_string())).await;
        self.take_error().await?;
        Ok(DeliveryAction {
            tracking_code: tracking_code.to_string(),
            accepted: true,
            raw: "{}".to_string(),
        })
    }
}
