//! Common test utilities for REST API testing.
//!
//! Builds an application over an in-memory SQLite backend and provides
//! helpers for provisioning tenants and addressing requests to their hosts.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode, header::HOST};
use axum_test::{TestRequest, TestServer};
use serde_json::{Value, json};

use realty_persistence::backends::sqlite::SqliteBackend;
use realty_rest::{ServerConfig, create_app_with_config, realty_catalog};

pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Creates a test server with the testing configuration.
pub async fn create_test_server() -> TestServer {
    create_test_server_with(ServerConfig::for_testing()).await
}

/// Creates a test server with the given configuration.
pub async fn create_test_server_with(config: ServerConfig) -> TestServer {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    serve_backend(backend, config).await
}

/// Creates a test server over a database file inside `dir`.
///
/// The in-memory backend runs on a single connection; use this where
/// requests should really overlap.
pub async fn create_file_test_server(dir: &tempfile::TempDir) -> TestServer {
    let backend = SqliteBackend::open(dir.path().join("realty.db"))
        .expect("Failed to open SQLite file");
    serve_backend(backend, ServerConfig::for_testing()).await
}

async fn serve_backend(backend: SqliteBackend, config: ServerConfig) -> TestServer {
    backend.init_schema().expect("Failed to init schema");

    let catalog = realty_catalog().expect("catalog is valid");
    let app = create_app_with_config(Arc::new(backend), Arc::new(catalog), config)
        .await
        .expect("Failed to create app");

    TestServer::new(app).expect("Failed to create test server")
}

/// Provisions a tenant over the admin API and returns the response body.
pub async fn provision(server: &TestServer, name: &str, domain: &str) -> Value {
    let response = server
        .post("/_admin/tenants")
        .json(&json!({
            "name": name,
            "contact_email": format!("ops@{}", domain),
            "domain": domain,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

/// Adds a `Host` header to a request.
pub fn on_host(request: TestRequest, host: &str) -> TestRequest {
    request.add_header(HOST, HeaderValue::from_str(host).expect("valid host header"))
}
