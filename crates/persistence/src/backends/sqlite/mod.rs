//! SQLite backend implementation.
//!
//! This module provides the SQLite implementation of the registry, the
//! partition store and entity storage. It supports both in-memory databases
//! (great for testing) and file-based databases (for development and small
//! deployments).
//!
//! # Partitions
//!
//! SQLite has no schemas, so each partition is a table-name prefix:
//! entity `lease` of partition `tenant_acme` lives in `tenant_acme__lease`.
//! Every partition carries its own migration ledger, `{partition}__schema_migrations`.
//!
//! # Example
//!
//! ```no_run
//! use realty_persistence::backends::sqlite::SqliteBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! The registry lives in the shared partition:
//!
//! ```sql
//! CREATE TABLE shared__registry_tenants (
//!     tenant_id TEXT PRIMARY KEY,
//!     partition_id TEXT NOT NULL UNIQUE,
//!     display_name TEXT NOT NULL,
//!     contact_email TEXT NOT NULL,
//!     address TEXT,
//!     phone TEXT,
//!     is_active INTEGER NOT NULL DEFAULT 1,
//!     created_at TEXT NOT NULL
//! );
//!
//! CREATE TABLE shared__registry_partitions (
//!     partition_id TEXT PRIMARY KEY,
//!     tenant_id TEXT UNIQUE,       -- NULL for the shared partition
//!     status TEXT NOT NULL,        -- pending | ready | failed | inactive
//!     last_error TEXT,
//!     created_at TEXT NOT NULL,
//!     updated_at TEXT NOT NULL
//! );
//!
//! CREATE TABLE shared__registry_domains (
//!     hostname TEXT PRIMARY KEY,
//!     tenant_id TEXT NOT NULL,
//!     is_primary INTEGER NOT NULL DEFAULT 0,
//!     created_at TEXT NOT NULL
//! );
//! ```

mod backend;
mod entity;
mod partition;
mod registry;
mod schema;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use schema::{LEDGER_TABLE, SCHEMA_VERSION};
