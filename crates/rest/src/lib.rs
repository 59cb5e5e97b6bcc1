//! # realty-rest - Host-routed REST API
//!
//! This crate serves the realty platform over HTTP. Every business request is
//! routed to a tenant by its host name and bound to that tenant's partition
//! before any handler runs; administration endpoints provision tenants,
//! manage their domains and roll out schema changes.
//!
//! ## Features
//!
//! - **Host routing**: `Host` (or a trusted `X-Forwarded-Host`) selects the
//!   tenant; unknown, inactive and unready hosts get a 404
//! - **Request-scoped binding**: the bound context travels in request
//!   extensions, never in shared state
//! - **Provisioning**: tenants are created, migrated and deprovisioned over
//!   the admin API
//! - **Entity access**: list, create and read for every catalog entity
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use realty_rest::{create_app_with_config, realty_catalog, ServerConfig};
//! use realty_persistence::backends::sqlite::SqliteBackend;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::open("realty.db")?;
//!     backend.init_schema()?;
//!
//!     let config = ServerConfig::default();
//!     let app = create_app_with_config(
//!         Arc::new(backend),
//!         Arc::new(realty_catalog()?),
//!         config,
//!     )
//!     .await?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Operation | HTTP Method | URL Pattern |
//! |-----------|-------------|-------------|
//! | bound tenant | GET | `/api/_tenant` |
//! | list | GET | `/api/{module}/{entity}` |
//! | create | POST | `/api/{module}/{entity}` |
//! | read | GET | `/api/{module}/{entity}/{id}` |
//! | provision | POST | `/_admin/tenants` |
//! | migrate all | POST | `/_admin/migrations` |
//!
//! See [`routing::create_routes`] for the full list.
//!
//! ## Error Handling
//!
//! Errors are returned as `{"error": code, "message": text}`:
//!
//! | HTTP Status | Code | Description |
//! |-------------|------|-------------|
//! | 400 | invalid | Bad request / validation error |
//! | 404 | not-found / unknown-tenant | Record or tenant not found |
//! | 409 | conflict | Duplicate domain, ID or migration conflict |
//! | 422 | processing | Unresolved reference |
//! | 500 | exception | Provisioning failure or internal error |
//! | 503 | unavailable | Backend not ready |
//!
//! ## Architecture
//!
//! - [`error`] - Error types and HTTP mapping
//! - [`config`] - Server configuration
//! - [`state`] - Application state (storage, provisioner, router)
//! - [`tenant`] - Host extraction and the tenant router
//! - [`middleware`] - Tenant routing middleware
//! - [`extractors`] - Bound context and pagination extractors
//! - [`handlers`] - HTTP request handlers
//! - [`catalog`] - The built-in real-estate entity catalog
//! - [`routing`] - Route configuration

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routing;
pub mod state;
pub mod tenant;

// Re-export commonly used types
pub use catalog::realty_catalog;
pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use state::{AppState, AppStorage};

use std::sync::Arc;

use axum::Router;
use realty_persistence::catalog::EntityCatalog;
use realty_persistence::error::StorageResult;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Builds the application state, initializes the shared partition and
/// returns the Axum application.
///
/// # Errors
///
/// Fails if the shared partition cannot be created.
///
/// # Example
///
/// ```rust,ignore
/// use realty_rest::{create_app_with_config, realty_catalog, ServerConfig};
///
/// let app = create_app_with_config(
///     Arc::new(backend),
///     Arc::new(realty_catalog()?),
///     ServerConfig::for_testing(),
/// )
/// .await?;
/// ```
pub async fn create_app_with_config<S: AppStorage>(
    storage: Arc<S>,
    catalog: Arc<EntityCatalog>,
    config: ServerConfig,
) -> StorageResult<Router> {
    info!("Creating REST API server with backend: {}", storage.name());

    let state = AppState::new(storage, catalog, config);
    state.provisioner().init_shared().await?;

    Ok(create_app(state))
}

/// Creates the Axum application over an existing state.
///
/// The shared partition must already be initialized.
pub fn create_app<S: AppStorage>(state: AppState<S>) -> Router {
    let config = state.config().clone();
    let router = routing::create_routes(state);

    // Build middleware stack
    let service_builder = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            std::time::Duration::from_secs(config.request_timeout),
        ))
        .map_response(|res: axum::http::Response<_>| res.map(axum::body::Body::new))
        .layer(RequestBodyLimitLayer::new(config.max_body_size));

    // Add CORS if enabled
    let router = if config.enable_cors {
        let cors = build_cors_layer(&config);
        router.layer(cors)
    } else {
        router
    };

    // Apply remaining middleware
    router.layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let mut cors = CorsLayer::new();

    if config.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    if config.cors_methods == "*" {
        cors = cors.allow_methods(Any);
    } else {
        let methods: Vec<_> = config
            .cors_methods
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_methods(methods);
    }

    if config.cors_headers == "*" {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<_> = config
            .cors_headers
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    cors
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup. `RUST_LOG` overrides
/// `level`. Isolation breaches are logged on the `realty::isolation_breach`
/// target, which stays enabled at `warn` or below.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "realty_rest={level},realty_persistence={level},realty_server={level},realty=warn,tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
