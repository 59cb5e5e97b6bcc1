//! Core storage traits and abstractions.
//!
//! This module provides the foundational traits for the persistence layer:
//!
//! - [`Backend`] - Driver name and health check
//! - [`PartitionRegistry`] - Routing key to partition mapping
//! - [`PartitionStore`] - Physical partition creation and migration
//! - [`EntityStorage`] - Partition-bound CRUD for business entities
//!
//! # Trait Hierarchy
//!
//! ```text
//! PartitionRegistry
//!     └── PartitionStore
//!
//! EntityStorage          (takes a BoundContext on every call)
//! ```
//!
//! The registry and partition store are only used by the router and the
//! provisioner. Business code sees [`EntityStorage`] alone, and only through
//! a [`BoundContext`](crate::tenant::BoundContext).

mod backend;
mod entity;
mod partition;
mod registry;

pub use backend::Backend;
pub use entity::EntityStorage;
pub use partition::PartitionStore;
pub use registry::PartitionRegistry;
