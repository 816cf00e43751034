//! Common test utilities for driving the router with mocks.
//!
//! The fixture builds an in-process router over a temporary SQLite file and
//! label directory, with the carrier and notifier replaced by test doubles.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use postagem_core::config::{DatabaseConfig, LabelConfig, PrintQueueConfig, ServerConfig};
use postagem_core::testing::{MockCarrier, RecordingNotifier};
use postagem_core::{Carrier, Config, Notifier, OrderBook, SqliteOrderBook};
use postagem_server::state::AppState;

/// Re-export fixtures for test convenience
pub use postagem_core::testing::fixtures;

/// Test fixture for API tests with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_create_pre_posting() {
///     let fixture = TestFixture::new();
///     fixture.seed_order(1001, "72910000");
///
///     let response = fixture.post("/api/v1/pre-postings", json!({
///         "order_id": 1001
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock carrier - script responses and inspect calls
    pub carrier: Arc<MockCarrier>,
    /// Order book over the test database
    pub orders: Arc<SqliteOrderBook>,
    /// Notifier that records what was sent
    pub notifier: Arc<RecordingNotifier>,
    /// Temporary directory for the database and label files
    pub temp_dir: TempDir,
    /// Where label documents are written
    pub label_dir: PathBuf,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response with the raw body, for document downloads
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl TestFixture {
    /// Create a new test fixture with default settings.
    pub fn new() -> Self {
        Self::with_max_attempts(3)
    }

    /// Create a fixture whose print queue tolerates `max_attempts` failures.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let label_dir = temp_dir.path().join("labels");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            carrier: fixtures::carrier_config(),
            labels: LabelConfig {
                storage_dir: label_dir.clone(),
                public_prefix: "/rotulos".to_string(),
                poll_delays_ms: vec![1, 1],
            },
            print_queue: PrintQueueConfig {
                max_attempts,
                pending_batch: 10,
            },
        };

        let carrier = Arc::new(MockCarrier::new());
        let orders = Arc::new(SqliteOrderBook::new(&db_path).expect("Failed to create order book"));
        let notifier = Arc::new(RecordingNotifier::new());

        let state = AppState::new(
            config,
            Arc::clone(&carrier) as Arc<dyn Carrier>,
            Arc::clone(&orders) as Arc<dyn OrderBook>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        )
        .expect("Failed to create app state");

        let router = postagem_server::api::create_router(Arc::new(state));

        Self {
            router,
            carrier,
            orders,
            notifier,
            temp_dir,
            label_dir,
        }
    }

    /// Insert an order with a delivery address.
    pub fn seed_order(&self, id: i64, postal_code: &str) {
        self.orders
            .insert_order(&fixtures::order(id, postal_code))
            .expect("Failed to seed order");
    }

    /// Insert a return request for an existing order.
    pub fn seed_return(&self, id: i64, order_id: i64) {
        self.orders
            .insert_return(&fixtures::return_request(id, order_id))
            .expect("Failed to seed return");
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and keep the body as bytes.
    pub async fn get_raw(&self, path: &str) -> RawResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        RawResponse {
            status,
            content_type,
            bytes,
        }
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
