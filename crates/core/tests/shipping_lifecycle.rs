//! Shipping lifecycle integration tests.
//!
//! These tests follow an order through the whole flow on one database file:
//! paid -> pre-posting -> label -> print queue -> tracked -> delivered,
//! plus the return path.

use std::sync::Arc;

use tempfile::TempDir;

use postagem_core::{
    carrier::LabelDownload,
    config::{LabelConfig, PrintQueueConfig},
    label::{LabelFiles, LabelFilter},
    orders::ReturnStatus,
    preposting::PrePostingFilter,
    print_queue::PrintQueueFilter,
    testing::{fixtures, MockCarrier, RecordingNotifier},
    LabelManager, OrderBook, OrderDispatcher, PrePostingManager, PrePostingStatus, PrintQueue,
    PrintStatus, SqliteLabelStore, SqliteOrderBook, SqlitePrePostingStore, SqlitePrintQueueStore,
    StatusReconciler,
};

/// Test helper wiring every manager over the same SQLite file.
struct TestHarness {
    carrier: Arc<MockCarrier>,
    orders: Arc<SqliteOrderBook>,
    notifier: Arc<RecordingNotifier>,
    pre_postings: Arc<PrePostingManager>,
    labels: Arc<LabelManager>,
    print_queue: Arc<PrintQueue>,
    reconciler: StatusReconciler,
    dispatcher: OrderDispatcher,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let label_dir = temp_dir.path().join("rotulos");

        let carrier = Arc::new(MockCarrier::new());
        let orders = Arc::new(SqliteOrderBook::new(&db_path).expect("Failed to create order book"));
        let notifier = Arc::new(RecordingNotifier::new());
        let posting_store = Arc::new(
            SqlitePrePostingStore::new(&db_path).expect("Failed to create pre-posting store"),
        );

        let pre_postings = Arc::new(PrePostingManager::new(
            posting_store.clone(),
            orders.clone(),
            carrier.clone(),
            notifier.clone(),
            fixtures::carrier_config(),
        ));
        let labels = Arc::new(LabelManager::new(
            Arc::new(SqliteLabelStore::new(&db_path).expect("Failed to create label store")),
            carrier.clone(),
            posting_store.clone(),
            LabelConfig {
                storage_dir: label_dir.clone(),
                public_prefix: "/rotulos".to_string(),
                poll_delays_ms: vec![1, 1, 1],
            },
        ));
        let print_queue = Arc::new(PrintQueue::new(
            Arc::new(
                SqlitePrintQueueStore::new(&db_path).expect("Failed to create print queue store"),
            ),
            orders.clone(),
            LabelFiles::new(label_dir),
            PrintQueueConfig {
                max_attempts: 2,
                pending_batch: 10,
            },
        ));
        let reconciler = StatusReconciler::new(posting_store, carrier.clone());
        let dispatcher = OrderDispatcher::new(
            pre_postings.clone(),
            labels.clone(),
            print_queue.clone(),
        );

        Self {
            carrier,
            orders,
            notifier,
            pre_postings,
            labels,
            print_queue,
            reconciler,
            dispatcher,
            temp_dir,
        }
    }
}

#[tokio::test]
async fn test_paid_order_to_delivery() {
    let h = TestHarness::new();
    h.orders
        .insert_order(&fixtures::order(1001, "72910000"))
        .unwrap();
    h.carrier.push_tracking_code("BR123456789BR").await;
    h.carrier
        .push_label_download(LabelDownload::Pending {
            message: Some("Processando".to_string()),
        })
        .await;
    h.carrier
        .push_label_download(LabelDownload::Ready {
            bytes: vec![0; 4096],
            file_name: Some("rotulo.pdf".to_string()),
        })
        .await;

    // Paid: pre-posting, label and print item in one go
    let outcome = h.dispatcher.on_order_paid(1001).await;
    assert!(outcome.is_complete(), "errors: {:?}", outcome.errors);

    let posting = outcome.pre_posting.unwrap();
    assert_eq!(posting.status, PrePostingStatus::Generated);
    assert_eq!(posting.tracking_code.as_deref(), Some("BR123456789BR"));
    assert_eq!(
        h.orders.get_order(1001).unwrap().unwrap().tracking_code.as_deref(),
        Some("BR123456789BR")
    );

    let labels = h
        .labels
        .list(&LabelFilter::default().with_order(1001))
        .unwrap();
    assert_eq!(labels.total_count, 1);
    let label = &labels.items[0];
    assert_eq!(label.size_bytes, 4096);
    assert_eq!(label.tracking_codes, vec!["BR123456789BR".to_string()]);
    assert!(label.file_path.starts_with("/rotulos/"));
    assert!(h
        .temp_dir
        .path()
        .join("rotulos")
        .join(&label.file_name)
        .exists());

    let pending = h.print_queue.list_pending(None).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, PrintStatus::Pending);
    assert_eq!(pending[0].order_code.as_deref(), Some("PED-1001"));

    // A print worker takes it, fails once, then prints it
    let item_id = pending[0].id;
    h.print_queue.reserve(item_id, "expedicao-01").unwrap();
    let retried = h.print_queue.fail(item_id, "Sem papel").unwrap();
    assert_eq!(retried.status, PrintStatus::Pending);
    h.print_queue.reserve(item_id, "expedicao-01").unwrap();
    let (_, bytes) = h.print_queue.file(item_id).await.unwrap();
    assert_eq!(bytes.len(), 4096);
    let printed = h.print_queue.confirm(item_id).unwrap();
    assert_eq!(printed.status, PrintStatus::Printed);
    assert_eq!(printed.attempts, 1);

    // The carrier picks it up
    h.carrier
        .set_tracking(fixtures::tracking_result(
            "BR123456789BR",
            &[("PO", "Objeto postado")],
        ))
        .await;
    let summary = h.reconciler.reconcile_all().await.unwrap();
    assert_eq!((summary.scanned, summary.updated, summary.failed), (1, 1, 0));
    let posted = h.pre_postings.get(posting.id).unwrap().unwrap();
    assert_eq!(posted.status, PrePostingStatus::Posted);
    assert!(posted.posted_at.is_some());

    h.carrier
        .set_tracking(fixtures::tracking_result(
            "BR123456789BR",
            &[
                ("RO", "Objeto em transferencia - por favor aguarde"),
                ("PO", "Objeto postado"),
            ],
        ))
        .await;
    h.reconciler.reconcile_all().await.unwrap();
    assert_eq!(
        h.pre_postings.get(posting.id).unwrap().unwrap().status,
        PrePostingStatus::InTransit
    );

    h.carrier
        .set_tracking(fixtures::tracking_result(
            "BR123456789BR",
            &[("BDE", "Objeto entregue ao destinatario")],
        ))
        .await;
    h.reconciler.reconcile_all().await.unwrap();
    let delivered = h.pre_postings.get(posting.id).unwrap().unwrap();
    assert_eq!(delivered.status, PrePostingStatus::Delivered);
    assert!(delivered.delivered_at.is_some());

    // Delivered postings are no longer reconciled
    let summary = h.reconciler.reconcile_all().await.unwrap();
    assert_eq!(summary.scanned, 0);
}

#[tokio::test]
async fn test_cancelled_pre_posting_frees_the_order() {
    let h = TestHarness::new();
    h.orders
        .insert_order(&fixtures::order(1001, "72910000"))
        .unwrap();

    let first = h.dispatcher.on_order_paid(1001).await;
    let first_id = first.pre_posting.unwrap().id;
    h.pre_postings.cancel(first_id).await.unwrap();

    let second = h
        .pre_postings
        .create(postagem_core::CreatePrePostingRequest::new(1001, "03298"))
        .await
        .unwrap();
    assert_ne!(second.id, first_id);
    assert_eq!(second.service_name, "PAC");

    let page = h
        .pre_postings
        .list(&PrePostingFilter::default().with_order(1001))
        .unwrap();
    assert_eq!(page.total_count, 2);
    let cancelled = h
        .pre_postings
        .list(&PrePostingFilter::default().with_status(PrePostingStatus::Cancelled))
        .unwrap();
    assert_eq!(cancelled.total_count, 1);
    assert_eq!(h.carrier.cancelled_ids().await.len(), 1);
}

#[tokio::test]
async fn test_dispatch_after_cancel_issues_a_new_label() {
    let h = TestHarness::new();
    h.orders
        .insert_order(&fixtures::order(1001, "72910000"))
        .unwrap();

    let first = h.dispatcher.on_order_paid(1001).await;
    assert!(first.is_complete(), "errors: {:?}", first.errors);
    let first_label = first.label.unwrap();
    assert_eq!(first_label.tracking_codes, vec!["AA000000001BR".to_string()]);
    h.pre_postings
        .cancel(first.pre_posting.unwrap().id)
        .await
        .unwrap();

    let second = h.dispatcher.on_order_paid(1001).await;
    assert!(second.is_complete(), "errors: {:?}", second.errors);
    let posting = second.pre_posting.unwrap();
    assert_eq!(posting.tracking_code.as_deref(), Some("AA000000003BR"));

    let label = second.label.unwrap();
    assert_ne!(label.receipt_id, first_label.receipt_id);
    assert_eq!(label.tracking_codes, vec!["AA000000003BR".to_string()]);
    assert_eq!(
        label.pre_posting_ids,
        vec![posting.carrier_id.clone().unwrap()]
    );
    assert_eq!(second.print_item.unwrap().label_id, label.id);

    let labels = h
        .labels
        .list(&LabelFilter::default().with_order(1001))
        .unwrap();
    assert_eq!(labels.total_count, 2);
}

#[tokio::test]
async fn test_dispatch_requeues_label_without_live_print_item() {
    let h = TestHarness::new();
    h.orders
        .insert_order(&fixtures::order(1001, "72910000"))
        .unwrap();

    let first = h.dispatcher.on_order_paid(1001).await;
    let first_item = first.print_item.unwrap();

    // Still pending: nothing new is queued
    let again = h.dispatcher.on_order_paid(1001).await;
    assert!(again.print_item.is_none());
    assert!(again.errors.is_empty());

    h.print_queue.cancel(first_item.id).unwrap();
    let requeued = h.dispatcher.on_order_paid(1001).await;
    assert!(requeued.is_complete(), "errors: {:?}", requeued.errors);
    let item = requeued.print_item.unwrap();
    assert_ne!(item.id, first_item.id);
    assert_eq!(item.label_id, first_item.label_id);
    assert_eq!(item.status, PrintStatus::Pending);
    assert_eq!(h.carrier.create_count().await, 1);

    // Printed labels are not printed again
    h.print_queue.reserve(item.id, "expedicao-01").unwrap();
    h.print_queue.confirm(item.id).unwrap();
    let after_print = h.dispatcher.on_order_paid(1001).await;
    assert!(after_print.print_item.is_none());

    let for_label = h
        .print_queue
        .list(&PrintQueueFilter::default().with_label(item.label_id))
        .unwrap();
    assert_eq!(for_label.total_count, 2);
}

#[tokio::test]
async fn test_print_item_exhausts_attempts() {
    let h = TestHarness::new();
    h.orders
        .insert_order(&fixtures::order(1001, "72910000"))
        .unwrap();
    let outcome = h.dispatcher.on_order_paid(1001).await;
    let item_id = outcome.print_item.unwrap().id;

    for attempt in 1..=2 {
        h.print_queue.reserve(item_id, "expedicao-01").unwrap();
        let item = h.print_queue.fail(item_id, "Impressora offline").unwrap();
        assert_eq!(item.attempts, attempt);
    }

    let item = h.print_queue.get(item_id).unwrap().unwrap();
    assert_eq!(item.status, PrintStatus::Error);
    assert_eq!(item.last_error.as_deref(), Some("Impressora offline"));
    assert!(h.print_queue.reserve(item_id, "expedicao-01").is_err());

    let errored = h
        .print_queue
        .list(&PrintQueueFilter::default().with_status(PrintStatus::Error))
        .unwrap();
    assert_eq!(errored.total_count, 1);
}

#[tokio::test]
async fn test_return_label_issued() {
    let h = TestHarness::new();
    h.orders
        .insert_order(&fixtures::order(1001, "72910000"))
        .unwrap();
    h.orders
        .insert_return(&fixtures::return_request(7, 1001))
        .unwrap();
    h.carrier.push_tracking_code("LR000000001BR").await;

    let ret = h.pre_postings.create_reverse(7).await.unwrap();

    assert_eq!(ret.status, ReturnStatus::LabelIssued);
    let shipment = ret.shipment.unwrap();
    assert_eq!(shipment.tracking_code.as_deref(), Some("LR000000001BR"));

    let payloads = h.carrier.created_payloads().await;
    assert_eq!(payloads.len(), 1);
    assert!(payloads[0].reverse.is_some());
    // The customer sends, the store receives
    assert_eq!(payloads[0].recipient.address.postal_code, "70000000");
    assert_eq!(payloads[0].sender.address.postal_code, "72910000");

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "cliente1001@example.com");
    assert!(sent[0].body.contains("LR000000001BR"));

    let stored = h.orders.get_return(7).unwrap().unwrap();
    assert_eq!(stored.status, ReturnStatus::LabelIssued);
}
