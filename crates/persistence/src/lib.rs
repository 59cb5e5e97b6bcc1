//! Realty Platform Persistence Layer
//!
//! This crate provides schema-per-tenant data isolation for a multi-tenant
//! property management platform: every tenant's business data lives in its
//! own partition, one shared partition holds platform-wide data and the
//! routing registry, and nothing in the request path can reach a partition
//! other than the one the request was bound to.
//!
//! # Features
//!
//! - **Routing registry**: durable host name → tenant → partition mapping
//! - **Provisioning**: partitions built from the entity catalog in dependency
//!   order, with retry, a time budget and at most one build per tenant
//! - **Migrations**: versioned schema deltas with a per-partition ledger,
//!   applied to one partition or fanned out to all of them
//! - **Bound access**: entity storage that only accepts a [`BoundContext`]
//!
//! # Backend Features
//!
//! Available backend features:
//! - `sqlite` (default) - SQLite with in-memory and file modes
//!
//! # Architecture
//!
//! The persistence layer is organized into several modules:
//!
//! - [`tenant`] - Tenant identity, routing keys and the request binding
//! - [`catalog`] - Entity definitions, classification and schema deltas
//! - [`types`] - Stored entities and pagination
//! - [`error`] - Error types for all operations
//! - [`core`] - Storage traits and abstractions
//! - [`strategy`] - Partition naming
//! - [`provision`] - The provisioner
//! - [`backends`] - Backend implementations
//!
//! # Quick Start
//!
//! ```
//! use realty_persistence::catalog::PartitionClass;
//! use realty_persistence::tenant::{
//!     BoundContext, PartitionId, PartitionRef, PartitionStatus, TenantId,
//! };
//!
//! let acme = PartitionRef {
//!     tenant_id: TenantId::new("acme"),
//!     partition_id: PartitionId::parse("tenant_acme").unwrap(),
//!     status: PartitionStatus::Ready,
//! };
//! let ctx = BoundContext::bind(acme, PartitionId::parse("shared").unwrap()).unwrap();
//!
//! assert_eq!(ctx.partition_for(PartitionClass::Isolated).as_str(), "tenant_acme");
//! assert_eq!(ctx.partition_for(PartitionClass::Shared).as_str(), "shared");
//! assert!(ctx.check_access(&PartitionId::parse("tenant_globex").unwrap()).is_err());
//! ```
//!
//! # Isolation
//!
//! All entity operations require a [`BoundContext`](tenant::BoundContext),
//! which can only be built from a `ready` partition. The target partition is
//! derived from the entity's class; callers never name a partition.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod catalog;
pub mod core;
pub mod error;
pub mod provision;
pub mod strategy;
pub mod tenant;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{StorageError, StorageResult};
pub use tenant::{BoundContext, PartitionId, PartitionRef, RoutingKey, TenantId};
pub use types::{Page, Pagination, StoredEntity};

// Re-export core traits
pub use core::{Backend, EntityStorage, PartitionRegistry, PartitionStore};

pub use catalog::{EntityCatalog, EntityDefinition, PartitionClass};
pub use provision::{Provisioner, ProvisioningConfig};
pub use strategy::{SchemaPerTenantConfig, SchemaPerTenantStrategy};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
