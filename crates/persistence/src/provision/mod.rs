//! Partition provisioning and migration.
//!
//! The [`Provisioner`] is the only component that creates or alters
//! partitions. It allocates a partition identifier for a new tenant, builds
//! the partition from the entity catalog in dependency order, and only then
//! marks it `ready` and registers the tenant's domain, so a partially built
//! partition is never routable.
//!
//! At most one provisioning or migration runs per tenant at a time within a
//! process; different tenants never wait on each other.

mod config;
mod in_flight;
mod provisioner;

pub use config::ProvisioningConfig;
pub use provisioner::{MigrationFailure, MigrationReport, Provisioner};
