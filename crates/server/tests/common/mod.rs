//! Common test utilities for driving the router in-process.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use queuedesk_core::config::DatabaseConfig;
use queuedesk_core::testing::ManualClock;
use queuedesk_core::{BroadcastPublisher, Config, QueueOrchestrator, SqliteQueueStore};
use queuedesk_server::state::AppState;

/// In-process server over a temporary database file.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new();
/// let response = fixture.post("/api/v1/services", json!({ "name": "Atención", "prefix": "ATC" })).await;
/// assert_eq!(response.status, StatusCode::CREATED);
/// ```
pub struct TestFixture {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub publisher: Arc<BroadcastPublisher>,
    /// Keeps the database file alive for the fixture's lifetime.
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(mut config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        config.database = DatabaseConfig {
            path: temp_dir.path().join("test.db"),
            ..config.database
        };

        let store = Arc::new(
            SqliteQueueStore::new(&config.database.path, &config.database)
                .expect("Failed to open queue store"),
        );
        let clock = Arc::new(ManualClock::default());
        let publisher = Arc::new(BroadcastPublisher::new(config.events.channel_capacity));
        let orchestrator = Arc::new(QueueOrchestrator::new(
            store,
            publisher.clone(),
            clock.clone(),
            config.queue.clone(),
        ));

        let state = Arc::new(AppState::new(config, orchestrator, publisher.clone()));
        let router = queuedesk_server::api::create_router(state);

        Self {
            router,
            clock,
            publisher,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
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
