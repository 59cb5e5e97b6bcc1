//! Server configuration for the realty REST API.
//!
//! Every setting can be given on the command line or through a `REALTY_*`
//! environment variable.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `REALTY_SERVER_PORT` | 8080 | Server port |
//! | `REALTY_SERVER_HOST` | 127.0.0.1 | Host to bind |
//! | `REALTY_LOG_LEVEL` | info | Log level |
//! | `REALTY_DATABASE_URL` | realty.db | SQLite file, or `:memory:` |
//! | `REALTY_SHARED_SCHEMA` | shared | Name of the shared partition |
//! | `REALTY_SCHEMA_PREFIX` | tenant_ | Prefix of tenant partition identifiers |
//! | `REALTY_PROVISION_TIMEOUT` | 30000 | Provisioning time budget (milliseconds) |
//! | `REALTY_TRUST_FORWARDED_HOST` | false | Route on `X-Forwarded-Host` |
//! | `REALTY_MAX_BODY_SIZE` | 1048576 | Max request body (bytes) |
//! | `REALTY_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `REALTY_DEFAULT_PAGE_SIZE` | 20 | Default list page size |
//! | `REALTY_MAX_PAGE_SIZE` | 500 | Maximum list page size |
//! | `REALTY_ENABLE_CORS` | true | Enable CORS |
//! | `REALTY_CORS_ORIGINS` | * | Allowed origins |
//! | `REALTY_CORS_METHODS` | GET,POST,DELETE,OPTIONS | Allowed methods |
//! | `REALTY_CORS_HEADERS` | Content-Type,Authorization,Accept,X-Request-Id | Allowed headers |
//!
//! # Example
//!
//! ```rust
//! use realty_rest::ServerConfig;
//!
//! let config = ServerConfig {
//!     port: 3000,
//!     host: "0.0.0.0".to_string(),
//!     trust_forwarded_host: true,
//!     ..Default::default()
//! };
//! assert_eq!(config.socket_addr(), "0.0.0.0:3000");
//! ```

use clap::Parser;
use realty_persistence::provision::ProvisioningConfig;
use realty_persistence::strategy::{SchemaPerTenantConfig, SchemaPerTenantStrategy};

/// Server configuration for the realty REST API.
#[derive(Debug, Clone, Parser)]
#[command(name = "realty")]
#[command(about = "Host-routed multi-tenant property management server")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "REALTY_SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "REALTY_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "REALTY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// SQLite database file, or `:memory:`.
    #[arg(long, env = "REALTY_DATABASE_URL", default_value = "realty.db")]
    pub database_url: String,

    /// Name of the shared partition.
    #[arg(long, env = "REALTY_SHARED_SCHEMA", default_value = "shared")]
    pub shared_schema: String,

    /// Prefix of tenant partition identifiers.
    #[arg(long, env = "REALTY_SCHEMA_PREFIX", default_value = "tenant_")]
    pub schema_prefix: String,

    /// Provisioning time budget in milliseconds.
    #[arg(long, env = "REALTY_PROVISION_TIMEOUT", default_value = "30000")]
    pub provision_timeout_ms: u64,

    /// Route on `X-Forwarded-Host` when present. Enable only behind a proxy
    /// that overwrites the header.
    #[arg(long, env = "REALTY_TRUST_FORWARDED_HOST", default_value = "false")]
    pub trust_forwarded_host: bool,

    /// Maximum request body size in bytes.
    #[arg(long, env = "REALTY_MAX_BODY_SIZE", default_value = "1048576")]
    pub max_body_size: usize,

    /// Request timeout in seconds.
    #[arg(long, env = "REALTY_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Default page size for entity lists.
    #[arg(long, env = "REALTY_DEFAULT_PAGE_SIZE", default_value = "20")]
    pub default_page_size: u32,

    /// Maximum page size for entity lists.
    #[arg(long, env = "REALTY_MAX_PAGE_SIZE", default_value = "500")]
    pub max_page_size: u32,

    /// Enable CORS.
    #[arg(long, env = "REALTY_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "REALTY_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(long, env = "REALTY_CORS_METHODS", default_value = "GET,POST,DELETE,OPTIONS")]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(
        long,
        env = "REALTY_CORS_HEADERS",
        default_value = "Content-Type,Authorization,Accept,X-Request-Id"
    )]
    pub cors_headers: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            database_url: "realty.db".to_string(),
            shared_schema: "shared".to_string(),
            schema_prefix: "tenant_".to_string(),
            provision_timeout_ms: 30_000,
            trust_forwarded_host: false,
            max_body_size: 1024 * 1024,
            request_timeout: 30,
            default_page_size: 20,
            max_page_size: 500,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,POST,DELETE,OPTIONS".to_string(),
            cors_headers: "Content-Type,Authorization,Accept,X-Request-Id".to_string(),
        }
    }
}

impl ServerConfig {
    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns true when the database lives in memory.
    pub fn is_memory_database(&self) -> bool {
        self.database_url == ":memory:"
    }

    /// Partition naming settings derived from this configuration.
    pub fn tenancy(&self) -> SchemaPerTenantConfig {
        SchemaPerTenantConfig {
            schema_prefix: self.schema_prefix.clone(),
            shared_schema: self.shared_schema.clone(),
            ..Default::default()
        }
    }

    /// Provisioner settings derived from this configuration.
    pub fn provisioning(&self) -> ProvisioningConfig {
        ProvisioningConfig {
            timeout_ms: self.provision_timeout_ms,
            ..Default::default()
        }
    }

    /// Validates the configuration and returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.database_url.trim().is_empty() {
            errors.push("Database URL cannot be empty".to_string());
        }

        if let Err(e) = SchemaPerTenantStrategy::new(self.tenancy()) {
            errors.push(e.to_string());
        }

        if self.provision_timeout_ms == 0 {
            errors.push("Provisioning timeout cannot be 0".to_string());
        }

        if self.max_body_size == 0 {
            errors.push("Max body size cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// Uses an in-memory database, ephemeral port 0 and a short provisioning
    /// budget.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            log_level: "debug".to_string(),
            database_url: ":memory:".to_string(),
            provision_timeout_ms: 5_000,
            request_timeout: 5,
            default_page_size: 10,
            max_page_size: 100,
            enable_cors: false,
            ..Default::default()
        }
    }
}
