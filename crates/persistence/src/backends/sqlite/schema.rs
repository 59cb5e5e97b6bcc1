//! SQLite registry schema definitions and migrations.
//!
//! The registry tables live in the shared partition, named with the same
//! `{partition}__{table}` convention as entity tables.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::error::{BackendError, StorageError, StorageResult};
use crate::strategy::{escape_identifier, physical_table};
use crate::tenant::PartitionId;

/// Current registry schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Name of the per-partition migration ledger table.
pub const LEDGER_TABLE: &str = "schema_migrations";

/// Quoted names of the registry tables.
#[derive(Debug, Clone)]
pub(crate) struct RegistryTables {
    pub tenants: String,
    pub partitions: String,
    pub domains: String,
    pub version: String,
    pub domains_by_tenant: String,
}

impl RegistryTables {
    pub fn new(shared: &PartitionId) -> Self {
        let quoted = |table: &str| escape_identifier(&physical_table(shared, table));
        Self {
            tenants: quoted("registry_tenants"),
            partitions: quoted("registry_partitions"),
            domains: quoted("registry_domains"),
            version: quoted("registry_version"),
            domains_by_tenant: quoted("registry_domains_by_tenant"),
        }
    }
}

/// Initialize the registry schema.
pub(crate) fn initialize_schema(
    conn: &mut Connection,
    tables: &RegistryTables,
    shared: &PartitionId,
) -> StorageResult<()> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| migration_error("Failed to begin schema transaction", e))?;

    let current_version = get_schema_version(&tx, tables)?;

    if current_version > SCHEMA_VERSION {
        return Err(StorageError::Backend(BackendError::MigrationError {
            message: format!(
                "registry schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            ),
        }));
    }

    if current_version == 0 {
        create_schema_v1(&tx, tables, shared)?;
        set_schema_version(&tx, tables, SCHEMA_VERSION)?;
        tracing::info!(shared = %shared, version = SCHEMA_VERSION, "Created registry schema");
    }

    tx.commit()
        .map_err(|e| migration_error("Failed to commit registry schema", e))?;
    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection, tables: &RegistryTables) -> StorageResult<i32> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (version INTEGER NOT NULL)",
            tables.version
        ),
        [],
    )
    .map_err(|e| migration_error("Failed to create registry_version table", e))?;

    let version: Option<i32> = conn
        .query_row(
            &format!("SELECT version FROM {} LIMIT 1", tables.version),
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| migration_error("Failed to read registry_version", e))?;

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, tables: &RegistryTables, version: i32) -> StorageResult<()> {
    conn.execute(&format!("DELETE FROM {}", tables.version), [])
        .map_err(|e| migration_error("Failed to clear registry_version", e))?;
    conn.execute(
        &format!("INSERT INTO {} (version) VALUES (?1)", tables.version),
        [version],
    )
    .map_err(|e| migration_error("Failed to set registry_version", e))?;
    Ok(())
}

/// Create the version 1 registry schema.
fn create_schema_v1(conn: &Connection, tables: &RegistryTables, shared: &PartitionId) -> StorageResult<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {tenants} (
            tenant_id TEXT PRIMARY KEY,
            partition_id TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            contact_email TEXT NOT NULL,
            address TEXT,
            phone TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {partitions} (
            partition_id TEXT PRIMARY KEY,
            tenant_id TEXT UNIQUE REFERENCES {tenants}(tenant_id),
            status TEXT NOT NULL
                CHECK (status IN ('pending', 'ready', 'failed', 'inactive')),
            last_error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {domains} (
            hostname TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES {tenants}(tenant_id),
            is_primary INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS {domains_by_tenant} ON {domains}(tenant_id);
        ",
        tenants = tables.tenants,
        partitions = tables.partitions,
        domains = tables.domains,
        domains_by_tenant = tables.domains_by_tenant,
    ))
    .map_err(|e| migration_error("Failed to create registry tables", e))?;

    let now = Utc::now().to_rfc3339();
    conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {} (partition_id, tenant_id, status, created_at, updated_at)
             VALUES (?1, NULL, 'ready', ?2, ?2)",
            tables.partitions
        ),
        params![shared.as_str(), now],
    )
    .map_err(|e| migration_error("Failed to record shared partition", e))?;

    create_ledger(conn, shared)
}

/// Create the migration ledger of a partition.
pub(crate) fn create_ledger(conn: &Connection, partition: &PartitionId) -> StorageResult<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
            escape_identifier(&physical_table(partition, LEDGER_TABLE))
        ),
        [],
    )
    .map_err(|e| migration_error("Failed to create migration ledger", e))?;
    Ok(())
}

fn migration_error(context: &str, err: rusqlite::Error) -> StorageError {
    StorageError::Backend(BackendError::MigrationError {
        message: format!("{}: {}", context, err),
    })
}
