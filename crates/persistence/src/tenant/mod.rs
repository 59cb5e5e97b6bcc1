//! Tenant identity and partition binding.
//!
//! This module provides the core types for schema-per-tenant isolation.
//! All entity storage operations require a [`BoundContext`], which can only be
//! produced from a ready partition, making it impossible to accidentally run a
//! tenant query without a resolved partition.
//!
//! # Core Types
//!
//! - [`TenantId`] - Canonical tenant identifier derived from the display name
//! - [`PartitionId`] - Schema name of a physical partition
//! - [`RoutingKey`] - Normalized host name used to resolve a tenant
//! - [`BoundContext`] - Immutable, request-scoped partition binding
//! - [`Tenant`], [`Domain`], [`PartitionRecord`] - Registry records
//!
//! # Examples
//!
//! ```
//! use realty_persistence::tenant::{RoutingKey, TenantDescriptor};
//!
//! let descriptor = TenantDescriptor::new(
//!     "Acme Corp",
//!     "ops@acme.example.com",
//!     RoutingKey::parse("acme.example.com").unwrap(),
//! );
//! assert_eq!(descriptor.tenant_id().unwrap().as_str(), "acme-corp");
//! ```

mod context;
mod id;
mod record;
mod routing_key;

pub use context::BoundContext;
pub use id::{MAX_PARTITION_ID_LEN, PartitionId, TenantId};
pub use record::{
    Domain, PartitionRecord, PartitionRef, PartitionStatus, Tenant, TenantDescriptor,
};
pub use routing_key::RoutingKey;
