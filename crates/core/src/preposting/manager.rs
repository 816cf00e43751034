//! Pre-posting manager: create, reverse, cancel and query.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::carrier::{service_name, Carrier};
use crate::config::CarrierConfig;
use crate::db;
use crate::metrics;
use crate::notify::Notifier;
use crate::orders::{OrderBook, ReturnRequest, ReturnShipment, ReturnStatus};

use super::payload;
use super::{
    CreatePrePostingRequest, NewPrePosting, PrePosting, PrePostingError, PrePostingFilter,
    PrePostingPage, PrePostingStatus, PrePostingStore,
};

/// Coordinates the carrier, the local store and the order book.
pub struct PrePostingManager {
    store: Arc<dyn PrePostingStore>,
    orders: Arc<dyn OrderBook>,
    carrier: Arc<dyn Carrier>,
    notifier: Arc<dyn Notifier>,
    config: CarrierConfig,
}

impl PrePostingManager {
    pub fn new(
        store: Arc<dyn PrePostingStore>,
        orders: Arc<dyn OrderBook>,
        carrier: Arc<dyn Carrier>,
        notifier: Arc<dyn Notifier>,
        config: CarrierConfig,
    ) -> Self {
        Self {
            store,
            orders,
            carrier,
            notifier,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn PrePostingStore> {
        &self.store
    }

    /// Create the forward pre-posting for an order.
    ///
    /// Returns the existing record when the order already has an active one.
    pub async fn create(
        &self,
        request: CreatePrePostingRequest,
    ) -> Result<PrePosting, PrePostingError> {
        let order = self
            .orders
            .get_order(request.order_id)?
            .ok_or(PrePostingError::OrderNotFound(request.order_id))?;

        if let Some(existing) = self.store.find_active_for_order(order.id)? {
            debug!(
                order_id = order.id,
                pre_posting_id = existing.id,
                "Order already has an active pre-posting"
            );
            return Ok(existing);
        }

        let address = order
            .delivery_address
            .as_ref()
            .ok_or(PrePostingError::MissingDeliveryAddress(order.id))?;

        let package = request.package();
        let declared_value = request.declared_value.unwrap_or_else(|| order.goods_value());
        let body = payload::forward(
            &order,
            address,
            &request.service_code,
            &package,
            declared_value,
            &self.config,
        );

        let created = self.carrier.create_pre_posting(&body).await?;

        let new = NewPrePosting {
            order_id: order.id,
            carrier_id: Some(created.carrier_id.clone()),
            tracking_code: created.tracking_code.clone(),
            label_number: created.label_number.clone(),
            service_code: request.service_code.clone(),
            service_name: service_name(&request.service_code).to_string(),
            package,
            declared_value: Some(declared_value),
            status: PrePostingStatus::Generated,
            posting_deadline: created.posting_deadline,
            notes: None,
            carrier_response: Some(created.raw.clone()),
        };

        let posting = match self.store.insert(&new) {
            Ok(posting) => posting,
            Err(PrePostingError::AlreadyActive(order_id)) => {
                // Lost a race with a concurrent create; drop our upstream duplicate.
                warn!(
                    order_id,
                    carrier_id = %created.carrier_id,
                    "Concurrent pre-posting creation, cancelling duplicate at carrier"
                );
                if let Err(e) = self.carrier.cancel_pre_posting(&created.carrier_id).await {
                    warn!(carrier_id = %created.carrier_id, error = %e, "Failed to cancel duplicate pre-posting");
                }
                return self
                    .store
                    .find_active_for_order(order_id)?
                    .ok_or(PrePostingError::AlreadyActive(order_id));
            }
            Err(e) => return Err(e),
        };

        if let Some(code) = &posting.tracking_code {
            if let Err(e) = self.orders.set_tracking_code(order.id, code) {
                warn!(order_id = order.id, tracking_code = %code, error = %e, "Failed to record tracking code on order");
            }
        }

        metrics::PRE_POSTINGS_CREATED.with_label_values(&["forward"]).inc();
        info!(
            order_id = order.id,
            pre_posting_id = posting.id,
            carrier_id = ?posting.carrier_id,
            tracking_code = ?posting.tracking_code,
            service = %posting.service_code,
            "Pre-posting created"
        );

        Ok(posting)
    }

    /// Create the carrier shipment that brings a returned order back.
    ///
    /// A return that already has its label is returned unchanged.
    pub async fn create_reverse(&self, return_id: i64) -> Result<ReturnRequest, PrePostingError> {
        let ret = self
            .orders
            .get_return(return_id)?
            .ok_or(PrePostingError::ReturnNotFound(return_id))?;

        if ret.shipment.is_some() {
            debug!(return_id, "Return already has a carrier shipment");
            return Ok(ret);
        }

        let order = self
            .orders
            .get_order(ret.order_id)?
            .ok_or(PrePostingError::OrderNotFound(ret.order_id))?;
        let address = order
            .delivery_address
            .as_ref()
            .ok_or(PrePostingError::MissingDeliveryAddress(order.id))?;

        let body = payload::reverse(&ret, &order, address, &self.config);
        let created = self.carrier.create_pre_posting(&body).await?;

        let shipment = ReturnShipment {
            carrier_id: created.carrier_id.clone(),
            tracking_code: created.tracking_code.clone(),
            posting_deadline: created.posting_deadline,
            carrier_response: created.raw.clone(),
        };
        let updated = self.orders.record_return_shipment(ret.id, &shipment)?;

        if let Err(e) = self
            .notifier
            .return_status_changed(&updated, ReturnStatus::LabelIssued)
            .await
        {
            warn!(return_id, error = %e, "Failed to notify customer about return label");
        }

        metrics::PRE_POSTINGS_CREATED.with_label_values(&["reverse"]).inc();
        info!(
            return_id,
            order_id = order.id,
            carrier_id = %shipment.carrier_id,
            tracking_code = ?shipment.tracking_code,
            "Return pre-posting created"
        );

        Ok(updated)
    }

    /// Cancel a pending or generated pre-posting.
    ///
    /// The carrier-side cancel is best effort; the local record is cancelled
    /// even when the carrier refuses.
    pub async fn cancel(&self, id: i64) -> Result<PrePosting, PrePostingError> {
        let posting = self.store.get(id)?.ok_or(PrePostingError::NotFound(id))?;
        if !posting.status.can_cancel() {
            return Err(PrePostingError::InvalidState {
                id,
                status: posting.status,
                operation: "cancel",
            });
        }

        if let Some(carrier_id) = &posting.carrier_id {
            if let Err(e) = self.carrier.cancel_pre_posting(carrier_id).await {
                warn!(pre_posting_id = id, carrier_id = %carrier_id, error = %e, "Carrier cancel failed, cancelling locally");
            }
        }

        let note = format!("Cancelada em {}", Utc::now().format("%d/%m/%Y %H:%M"));
        let cancelled = self.store.mark_cancelled(id, &note)?;

        metrics::PRE_POSTINGS_CANCELLED.inc();
        info!(pre_posting_id = id, order_id = cancelled.order_id, "Pre-posting cancelled");

        Ok(cancelled)
    }

    pub fn get(&self, id: i64) -> Result<Option<PrePosting>, PrePostingError> {
        self.store.get(id)
    }

    /// The order's active pre-posting, or its most recent one.
    pub fn get_by_order(&self, order_id: i64) -> Result<Option<PrePosting>, PrePostingError> {
        match self.store.find_active_for_order(order_id)? {
            Some(active) => Ok(Some(active)),
            None => self.store.latest_for_order(order_id),
        }
    }

    pub fn list(&self, filter: &PrePostingFilter) -> Result<PrePostingPage, PrePostingError> {
        let items = self.store.list(filter)?;
        let total_count = self.store.count(filter)?;
        Ok(PrePostingPage {
            items,
            total_count,
            page: filter.page,
            page_size: filter.page_size,
            total_pages: db::total_pages(total_count, filter.page_size),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::CarrierError;
    use crate::orders::SqliteOrderBook;
    use crate::preposting::SqlitePrePostingStore;
    use crate::testing::{fixtures, MockCarrier, RecordingNotifier};

    struct Harness {
        manager: PrePostingManager,
        carrier: Arc<MockCarrier>,
        orders: Arc<SqliteOrderBook>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness() -> Harness {
        let carrier = Arc::new(MockCarrier::new());
        let orders = Arc::new(SqliteOrderBook::in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::new());
        orders.insert_order(&fixtures::order(1001, "72910000")).unwrap();

        let manager = PrePostingManager::new(
            Arc::new(SqlitePrePostingStore::in_memory().unwrap()),
            orders.clone(),
            carrier.clone(),
            notifier.clone(),
            fixtures::carrier_config(),
        );
        Harness {
            manager,
            carrier,
            orders,
            notifier,
        }
    }

    #[tokio::test]
    async fn test_create_persists_generated_posting() {
        let h = harness();

        let posting = h
            .manager
            .create(CreatePrePostingRequest::new(1001, "03298"))
            .await
            .unwrap();

        assert_eq!(posting.status, PrePostingStatus::Generated);
        assert_eq!(posting.service_name, "PAC");
        assert_eq!(posting.carrier_id.as_deref(), Some("PP000001"));
        assert_eq!(posting.tracking_code.as_deref(), Some("AA000000001BR"));
        assert!(posting.carrier_response.is_some());

        let order = h.orders.get_order(1001).unwrap().unwrap();
        assert_eq!(order.tracking_code, posting.tracking_code);
        assert_eq!(posting.declared_value, Some(order.goods_value()));
    }

    #[tokio::test]
    async fn test_create_is_idempotent_per_order() {
        let h = harness();
        let first = h
            .manager
            .create(CreatePrePostingRequest::new(1001, "03220"))
            .await
            .unwrap();
        let second = h
            .manager
            .create(CreatePrePostingRequest::new(1001, "03298"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.service_code, "03220");
        assert_eq!(h.carrier.create_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_keep_one_posting() {
        let h = harness();
        h.carrier
            .delay_creates(std::time::Duration::from_millis(50))
            .await;

        let (a, b) = tokio::join!(
            h.manager.create(CreatePrePostingRequest::new(1001, "03220")),
            h.manager.create(CreatePrePostingRequest::new(1001, "03220")),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.id, b.id);
        assert_eq!(h.carrier.create_count().await, 2);
        let winner = a.carrier_id.clone().unwrap();
        let cancelled = h.carrier.cancelled_ids().await;
        assert_eq!(cancelled.len(), 1);
        assert_ne!(cancelled[0], winner);
        assert!(cancelled[0] == "PP000001" || cancelled[0] == "PP000002");

        let page = h
            .manager
            .list(&PrePostingFilter::default().with_order(1001))
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].status, PrePostingStatus::Generated);
    }

    #[tokio::test]
    async fn test_create_unknown_order() {
        let h = harness();
        let err = h
            .manager
            .create(CreatePrePostingRequest::new(404, "03220"))
            .await
            .unwrap_err();
        assert!(matches!(err, PrePostingError::OrderNotFound(404)));
        assert_eq!(h.carrier.create_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_without_address_never_calls_carrier() {
        let h = harness();
        let mut order = fixtures::order(2002, "01001000");
        order.delivery_address = None;
        h.orders.insert_order(&order).unwrap();

        let err = h
            .manager
            .create(CreatePrePostingRequest::new(2002, "03220"))
            .await
            .unwrap_err();
        assert!(matches!(err, PrePostingError::MissingDeliveryAddress(2002)));
        assert_eq!(h.carrier.create_count().await, 0);
    }

    #[tokio::test]
    async fn test_carrier_rejection_leaves_no_record() {
        let h = harness();
        h.carrier
            .fail_next(CarrierError::Api {
                status: 400,
                body: "CEP invalido".to_string(),
            })
            .await;

        let err = h
            .manager
            .create(CreatePrePostingRequest::new(1001, "03220"))
            .await
            .unwrap_err();
        assert!(matches!(err, PrePostingError::Carrier(CarrierError::Api { status: 400, .. })));
        assert!(h.manager.get_by_order(1001).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_then_recreate() {
        let h = harness();
        let first = h
            .manager
            .create(CreatePrePostingRequest::new(1001, "03220"))
            .await
            .unwrap();

        let cancelled = h.manager.cancel(first.id).await.unwrap();
        assert_eq!(cancelled.status, PrePostingStatus::Cancelled);
        assert!(cancelled.notes.unwrap().starts_with("Cancelada em "));
        assert_eq!(h.carrier.cancelled_ids().await, vec!["PP000001".to_string()]);

        let second = h
            .manager
            .create(CreatePrePostingRequest::new(1001, "03220"))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(h.manager.get_by_order(1001).unwrap().unwrap().id, second.id);
    }

    #[tokio::test]
    async fn test_cancel_survives_carrier_failure() {
        let h = harness();
        let posting = h
            .manager
            .create(CreatePrePostingRequest::new(1001, "03220"))
            .await
            .unwrap();
        h.carrier.fail_next(CarrierError::Timeout).await;

        let cancelled = h.manager.cancel(posting.id).await.unwrap();
        assert_eq!(cancelled.status, PrePostingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_rejects_delivered() {
        let h = harness();
        let posting = h
            .manager
            .create(CreatePrePostingRequest::new(1001, "03220"))
            .await
            .unwrap();
        h.manager
            .store()
            .apply_status_updates(&[crate::preposting::StatusUpdate {
                id: posting.id,
                status: PrePostingStatus::Delivered,
                posted_at: None,
                delivered_at: Some(Utc::now()),
            }])
            .unwrap();

        let err = h.manager.cancel(posting.id).await.unwrap_err();
        assert!(matches!(err, PrePostingError::InvalidState { .. }));
        assert!(h.carrier.cancelled_ids().await.is_empty());

        assert!(matches!(
            h.manager.cancel(999).await.unwrap_err(),
            PrePostingError::NotFound(999)
        ));
    }

    #[tokio::test]
    async fn test_create_reverse_records_shipment_and_notifies() {
        let h = harness();
        h.orders
            .insert_return(&fixtures::return_request(7, 1001))
            .unwrap();

        let updated = h.manager.create_reverse(7).await.unwrap();

        assert_eq!(updated.status, ReturnStatus::LabelIssued);
        let shipment = updated.shipment.unwrap();
        assert_eq!(shipment.carrier_id, "PP000001");

        let payloads = h.carrier.created_payloads().await;
        assert_eq!(payloads[0].reverse.as_deref(), Some("N"));
        assert_eq!(payloads[0].recipient.name, "Loja Exemplo");

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "cliente1001@example.com");

        // No local forward record is created for returns
        assert!(h.manager.get_by_order(1001).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_reverse_is_idempotent() {
        let h = harness();
        h.orders
            .insert_return(&fixtures::return_request(7, 1001))
            .unwrap();

        h.manager.create_reverse(7).await.unwrap();
        h.manager.create_reverse(7).await.unwrap();
        assert_eq!(h.carrier.create_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_reverse_tolerates_notification_failure() {
        let h = harness();
        h.orders
            .insert_return(&fixtures::return_request(7, 1001))
            .unwrap();
        h.notifier.set_failing(true);

        let updated = h.manager.create_reverse(7).await.unwrap();
        assert_eq!(updated.status, ReturnStatus::LabelIssued);
    }

    #[tokio::test]
    async fn test_create_reverse_unknown_return() {
        let h = harness();
        assert!(matches!(
            h.manager.create_reverse(99).await.unwrap_err(),
            PrePostingError::ReturnNotFound(99)
        ));
    }

    #[tokio::test]
    async fn test_list_pages() {
        let h = harness();
        for id in 2..=4 {
            h.orders.insert_order(&fixtures::order(id, "72910000")).unwrap();
            h.manager
                .create(CreatePrePostingRequest::new(id, "03220"))
                .await
                .unwrap();
        }

        let page = h
            .manager
            .list(&PrePostingFilter::new().with_page(1, 2))
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_count, 3);
        assert_eq!(page.total_pages, 2);
    }
}
