pub mod carrier;
pub mod config;
mod db;
pub mod dispatch;
pub mod label;
pub mod metrics;
pub mod notify;
pub mod orders;
pub mod preposting;
pub mod print_queue;
pub mod reconciler;
pub mod retry;
pub mod testing;

pub use carrier::{
    Carrier, CarrierAuthenticator, CarrierError, CorreiosClient, CorreiosTokenSource,
    LabelIdentification, LabelOptions, QuoteRequest, ServiceQuote, ShippingService,
    TrackingResult,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use dispatch::{DispatchOutcome, OrderDispatcher};
pub use label::{Label, LabelError, LabelJobContext, LabelManager, LabelOutcome, SqliteLabelStore};
pub use notify::{LogNotifier, Notifier, NotifyError};
pub use orders::{OrderBook, OrderBookError, SqliteOrderBook};
pub use preposting::{
    CreatePrePostingRequest, PrePosting, PrePostingError, PrePostingManager, PrePostingStatus,
    SqlitePrePostingStore,
};
pub use print_queue::{PrintQueue, PrintQueueError, PrintQueueItem, PrintStatus, SqlitePrintQueueStore};
pub use reconciler::{ReconcileSummary, StatusReconciler};
pub use retry::{Attempt, RetryPolicy};
