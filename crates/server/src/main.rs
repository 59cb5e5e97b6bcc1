//! Realty platform server.
//!
//! Serves every tenant of the property management platform from one process,
//! routing each request to its tenant's partition by host name.

use std::sync::Arc;

use clap::Parser;
use realty_rest::{ServerConfig, create_app_with_config, init_logging, realty_catalog};
use tracing::info;

#[cfg(feature = "sqlite")]
use realty_persistence::backends::sqlite::{SqliteBackend, SqliteBackendConfig};

/// Creates and initializes a SQLite backend from the server configuration.
#[cfg(feature = "sqlite")]
fn create_sqlite_backend(config: &ServerConfig) -> anyhow::Result<SqliteBackend> {
    info!(database = %config.database_url, "Initializing SQLite backend");

    let backend_config = SqliteBackendConfig {
        tenancy: config.tenancy(),
        ..Default::default()
    };

    let backend = SqliteBackend::with_config(&config.database_url, backend_config)?;
    backend.init_schema()?;

    Ok(backend)
}

/// Starts the Axum HTTP server and runs until Ctrl-C.
async fn serve(app: axum::Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        port = config.port,
        host = %config.host,
        shared_schema = %config.shared_schema,
        schema_prefix = %config.schema_prefix,
        trust_forwarded_host = config.trust_forwarded_host,
        "Starting realty server"
    );

    start_sqlite(config).await
}

/// Starts the server with the SQLite backend.
#[cfg(feature = "sqlite")]
async fn start_sqlite(config: ServerConfig) -> anyhow::Result<()> {
    let backend = create_sqlite_backend(&config)?;
    let catalog = realty_catalog()?;
    info!(
        entities = catalog.len(),
        modules = ?catalog.modules(),
        "Entity catalog loaded"
    );

    let app = create_app_with_config(Arc::new(backend), Arc::new(catalog), config.clone()).await?;
    serve(app, &config).await
}

/// Fallback when sqlite feature is not enabled.
#[cfg(not(feature = "sqlite"))]
async fn start_sqlite(_config: ServerConfig) -> anyhow::Result<()> {
    anyhow::bail!(
        "The sqlite backend requires the 'sqlite' feature. \
         Build with: cargo build -p realty-server --features sqlite"
    )
}
