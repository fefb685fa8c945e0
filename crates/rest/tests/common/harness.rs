//! HTTP API test harness.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, header};
use axum_test::{TestResponse, TestServer};
use serde_json::{Value, json};
use storefront_jsonapi::SchemaRegistry;
use storefront_persistence::backends::sqlite::SqliteBackend;
use storefront_rest::{ServerConfig, create_app_with_registry};

/// Media type every JSON:API request body carries.
pub const JSON_API: &str = "application/vnd.api+json";

/// Test server with an initialized in-memory database.
pub struct TestHarness {
    /// The test server instance.
    pub server: TestServer,

    /// The storage backend, for seeding and inspection.
    pub backend: Arc<SqliteBackend>,
}

#[allow(dead_code)]
impl TestHarness {
    /// Creates a harness with [`ServerConfig::for_testing`].
    pub fn new() -> Self {
        Self::with_config(ServerConfig::for_testing())
    }

    /// Creates a harness with a custom configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
        backend.init_schema().expect("Failed to initialize schema");
        let backend = Arc::new(backend);

        let registry = Arc::new(SchemaRegistry::storefront().expect("registry"));
        let app = create_app_with_registry(Arc::clone(&backend), registry, config);
        let server = TestServer::new(app).expect("Failed to create test server");

        Self { server, backend }
    }

    /// GET with the JSON:API `Accept` header.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.server
            .get(path)
            .add_header(header::ACCEPT, HeaderValue::from_static(JSON_API))
            .await
    }

    /// POST a JSON:API document.
    pub async fn post(&self, path: &str, body: &Value) -> TestResponse {
        self.server
            .post(path)
            .content_type(JSON_API)
            .bytes(Bytes::from(body.to_string()))
            .await
    }

    /// PATCH a JSON:API document.
    pub async fn patch(&self, path: &str, body: &Value) -> TestResponse {
        self.server
            .patch(path)
            .content_type(JSON_API)
            .bytes(Bytes::from(body.to_string()))
            .await
    }

    /// DELETE a resource.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.server.delete(path).await
    }

    /// Creates a resource over HTTP and returns its id.
    pub async fn create(&self, resource_type: &str, attributes: Value) -> String {
        let body = json!({"data": {"type": resource_type, "attributes": attributes}});
        let response = self.post(&format!("/api/v1/{}", resource_type), &body).await;
        let value: Value = response.json();
        value["data"]["id"]
            .as_str()
            .unwrap_or_else(|| panic!("create {} failed: {}", resource_type, value))
            .to_string()
    }

    /// Returns the value of a response header, if present.
    pub fn header(response: &TestResponse, name: HeaderName) -> Option<String> {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}
