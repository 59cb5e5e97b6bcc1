//! SQLite backend implementation.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::core::Backend;
use crate::error::{BackendError, StorageError, StorageResult};
use crate::strategy::{SchemaPerTenantConfig, SchemaPerTenantStrategy};

use super::schema::{self, RegistryTables};

/// SQLite backend for the registry and all partitions.
///
/// Partitions are emulated with prefixed table names in a single database
/// file; see [`SchemaPerTenantStrategy`].
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    strategy: SchemaPerTenantStrategy,
    pub(crate) tables: RegistryTables,
    is_memory: bool,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .field("shared_partition", self.strategy.shared_partition())
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool.
    ///
    /// In-memory databases always use a single connection, since each
    /// connection to `:memory:` opens a separate database.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for better concurrency.
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    /// Enable foreign key constraints.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,

    /// Partition naming.
    #[serde(default)]
    pub tenancy: SchemaPerTenantConfig,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
            tenancy: SchemaPerTenantConfig::default(),
        }
    }
}

impl SqliteBackend {
    /// Creates a new in-memory SQLite backend.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a backend with custom configuration.
    ///
    /// Every pooled connection gets the busy timeout, foreign key and WAL
    /// settings when it is opened.
    pub fn with_config<P: AsRef<Path>>(path: P, config: SqliteBackendConfig) -> StorageResult<Self> {
        let strategy = SchemaPerTenantStrategy::new(config.tenancy.clone())?;

        let path_str = path.as_ref().to_string_lossy();
        let is_memory = path_str == ":memory:";

        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let enable_foreign_keys = config.enable_foreign_keys;
        let enable_wal = config.enable_wal && !is_memory;

        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path.as_ref())
        }
        .with_init(move |conn: &mut Connection| {
            conn.busy_timeout(busy_timeout)?;
            if enable_foreign_keys {
                conn.pragma_update(None, "foreign_keys", true)?;
            }
            if enable_wal {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
            }
            Ok(())
        });

        let mut builder = Pool::builder()
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms));
        builder = if is_memory {
            builder
                .max_size(1)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            builder
                .max_size(config.max_connections)
                .min_idle(Some(config.min_connections))
        };

        let pool = builder.build(manager).map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })
        })?;

        let tables = RegistryTables::new(strategy.shared_partition());

        Ok(Self {
            pool,
            config,
            strategy,
            tables,
            is_memory,
        })
    }

    /// Initialize the registry schema and the shared partition ledger.
    pub fn init_schema(&self) -> StorageResult<()> {
        let mut conn = self.get_connection()?;
        schema::initialize_schema(&mut conn, &self.tables, self.strategy.shared_partition())
    }

    /// Get a connection from the pool.
    pub(crate) fn get_connection(&self) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })
        })
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }

    pub(crate) fn naming(&self) -> &SchemaPerTenantStrategy {
        &self.strategy
    }
}

/// Returns `true` if a table exists.
pub(crate) fn table_exists(conn: &Connection, table: &str) -> StorageResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Returns `true` if a column exists on a table.
pub(crate) fn column_exists(conn: &Connection, table: &str, column: &str) -> StorageResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2",
            [table, column],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

#[async_trait]
impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let conn = self
            .get_connection()
            .map_err(|_| BackendError::Unavailable {
                backend_name: "sqlite".to_string(),
                message: "Failed to get connection".to_string(),
            })?;
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.tables.partitions),
            [],
            |row| row.get::<_, i64>(0),
        )
        .map_err(|e| BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: format!("Health check failed: {}", e),
            source: None,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_backend() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert!(backend.is_memory());
        backend.init_schema().unwrap();
    }

    #[test]
    fn test_invalid_tenancy_config_rejected() {
        let config = SqliteBackendConfig {
            tenancy: SchemaPerTenantConfig::new().with_shared_schema("Shared"),
            ..Default::default()
        };
        assert!(SqliteBackend::with_config(":memory:", config).is_err());
    }

    #[test]
    fn test_file_backend_persists_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");

        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend.init_schema().unwrap();
        }

        let backend = SqliteBackend::open(&path).unwrap();
        let conn = backend.get_connection().unwrap();
        assert!(table_exists(&conn, "shared__registry_tenants").unwrap());
        assert!(column_exists(&conn, "shared__registry_tenants", "partition_id").unwrap());
        assert!(!column_exists(&conn, "shared__registry_tenants", "nope").unwrap());
    }

    #[tokio::test]
    async fn test_health_check() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert!(backend.health_check().await.is_err());
        backend.init_schema().unwrap();
        assert!(backend.health_check().await.is_ok());
    }
}
