use std::sync::Arc;

use anyhow::{Context, Result};
use postagem_core::label::LabelFiles;
use postagem_core::{
    Carrier, Config, LabelManager, Notifier, OrderBook, OrderDispatcher, PrePostingManager,
    PrintQueue, SanitizedConfig, SqliteLabelStore, SqlitePrePostingStore, SqlitePrintQueueStore,
    StatusReconciler,
};

/// Shared application state
pub struct AppState {
    config: Config,
    carrier: Arc<dyn Carrier>,
    orders: Arc<dyn OrderBook>,
    pre_postings: Arc<PrePostingManager>,
    labels: Arc<LabelManager>,
    print_queue: Arc<PrintQueue>,
    reconciler: StatusReconciler,
    dispatcher: OrderDispatcher,
}

impl AppState {
    /// Wire the shipping services over the configured database.
    ///
    /// Pre-postings, labels and print items share the SQLite file named in
    /// `[database]`; label documents go to `[labels].storage_dir`.
    pub fn new(
        config: Config,
        carrier: Arc<dyn Carrier>,
        orders: Arc<dyn OrderBook>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let db_path = &config.database.path;

        let pre_posting_store = Arc::new(
            SqlitePrePostingStore::new(db_path).context("Failed to create pre-posting store")?,
        );
        let label_store =
            Arc::new(SqliteLabelStore::new(db_path).context("Failed to create label store")?);
        let print_store = Arc::new(
            SqlitePrintQueueStore::new(db_path).context("Failed to create print queue store")?,
        );

        let pre_postings = Arc::new(PrePostingManager::new(
            pre_posting_store.clone(),
            Arc::clone(&orders),
            Arc::clone(&carrier),
            notifier,
            config.carrier.clone(),
        ));
        let labels = Arc::new(LabelManager::new(
            label_store,
            Arc::clone(&carrier),
            pre_posting_store.clone(),
            config.labels.clone(),
        ));
        let print_queue = Arc::new(PrintQueue::new(
            print_store,
            Arc::clone(&orders),
            LabelFiles::new(config.labels.storage_dir.clone()),
            config.print_queue.clone(),
        ));
        let reconciler = StatusReconciler::new(pre_posting_store, Arc::clone(&carrier));
        let dispatcher = OrderDispatcher::new(
            Arc::clone(&pre_postings),
            Arc::clone(&labels),
            Arc::clone(&print_queue),
        );

        Ok(Self {
            config,
            carrier,
            orders,
            pre_postings,
            labels,
            print_queue,
            reconciler,
            dispatcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn carrier(&self) -> &dyn Carrier {
        self.carrier.as_ref()
    }

    pub fn orders(&self) -> &dyn OrderBook {
        self.orders.as_ref()
    }

    pub fn pre_postings(&self) -> &PrePostingManager {
        &self.pre_postings
    }

    pub fn labels(&self) -> &LabelManager {
        &self.labels
    }

    pub fn print_queue(&self) -> &PrintQueue {
        &self.print_queue
    }

    pub fn reconciler(&self) -> &StatusReconciler {
        &self.reconciler
    }

    pub fn dispatcher(&self) -> &OrderDispatcher {
        &self.dispatcher
    }
}
