use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use postagem_core::{
    load_config, validate_config, Carrier, CorreiosClient, LogNotifier, Notifier, OrderBook,
    SqliteOrderBook,
};
use postagem_server::api::create_router;
use postagem_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("POSTAGEM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded"
    );
    info!("Database path: {:?}", config.database.path);
    info!("Carrier API: {}", config.carrier.base_url);
    if !config.carrier.has_credentials() {
        warn!("Carrier credentials not configured, authenticated calls will fail");
    }

    tokio::fs::create_dir_all(&config.labels.storage_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create label directory {:?}",
                config.labels.storage_dir
            )
        })?;

    // Orders and returns live in the storefront's tables of the same database
    let orders: Arc<dyn OrderBook> = Arc::new(
        SqliteOrderBook::new(&config.database.path).context("Failed to open order book")?,
    );

    let carrier: Arc<dyn Carrier> = Arc::new(
        CorreiosClient::new(config.carrier.clone()).context("Failed to create carrier client")?,
    );
    info!("Carrier client initialized ({})", carrier.name());

    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let state = Arc::new(
        AppState::new(config.clone(), carrier, orders, notifier)
            .context("Failed to initialize shipping services")?,
    );

    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
