//! Partition lifecycle trait.

use async_trait::async_trait;

use super::registry::PartitionRegistry;
use crate::catalog::{AppliedMigration, EntityDefinition, MigrationOutcome, SchemaDelta};
use crate::error::StorageResult;
use crate::strategy::SchemaPerTenantStrategy;
use crate::tenant::{PartitionId, PartitionRecord, PartitionStatus, Tenant, TenantId};

/// Physical partition management, used by the provisioner.
///
/// Every method is idempotent at the DDL level: creating what already exists
/// is a no-op, so an interrupted provisioning run can be repeated from the
/// start.
#[async_trait]
pub trait PartitionStore: PartitionRegistry {
    /// Returns the naming rules this store uses.
    fn strategy(&self) -> &SchemaPerTenantStrategy;

    /// Atomically records a new tenant and its `pending` partition.
    ///
    /// # Errors
    ///
    /// - [`ProvisioningError::PartitionTaken`](crate::error::ProvisioningError::PartitionTaken)
    ///   if the partition identifier is already assigned
    /// - [`ProvisioningError::InProgress`](crate::error::ProvisioningError::InProgress)
    ///   if the tenant already exists
    async fn create_tenant_partition(&self, tenant: &Tenant) -> StorageResult<PartitionRecord>;

    /// Compare-and-set on partition status.
    ///
    /// Moves the partition to `to` only if its current status is one of
    /// `from`. Returns whether the transition happened.
    async fn transition_partition(
        &self,
        partition_id: &PartitionId,
        from: &[PartitionStatus],
        to: PartitionStatus,
        last_error: Option<&str>,
    ) -> StorageResult<bool>;

    /// Activates or deactivates a tenant.
    async fn set_tenant_active(&self, tenant_id: &TenantId, active: bool) -> StorageResult<()>;

    /// Creates the physical container and its migration ledger.
    async fn create_partition(&self, partition_id: &PartitionId) -> StorageResult<()>;

    /// Creates an entity table in a partition if it does not exist.
    ///
    /// References to entities already present in the same partition become
    /// enforced foreign keys; references to shared entities are plain
    /// columns. A reference to an entity present in neither is an error, so
    /// definitions must be applied in dependency order.
    async fn apply_definition(
        &self,
        partition_id: &PartitionId,
        definition: &EntityDefinition,
    ) -> StorageResult<()>;

    /// Records a delta as applied without running it.
    ///
    /// Used for deltas already reflected in the definitions a partition was
    /// created from.
    async fn record_baseline(&self, partition_id: &PartitionId, delta: &SchemaDelta)
    -> StorageResult<()>;

    /// Applies a delta in one transaction, consulting the ledger first.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::ChecksumMismatch`](crate::error::MigrationError::ChecksumMismatch)
    ///   if the version was applied with different changes
    /// - [`MigrationError::OutOfOrder`](crate::error::MigrationError::OutOfOrder)
    ///   if the prerequisite version is missing
    /// - [`MigrationError::UnknownEntity`](crate::error::MigrationError::UnknownEntity)
    ///   if a change targets a table that does not exist
    async fn apply_delta(
        &self,
        partition_id: &PartitionId,
        delta: &SchemaDelta,
    ) -> StorageResult<MigrationOutcome>;

    /// Returns the migration ledger of a partition.
    async fn applied_migrations(
        &self,
        partition_id: &PartitionId,
    ) -> StorageResult<Vec<AppliedMigration>>;

    /// Returns the names of the entity tables present in a partition.
    async fn entity_tables(&self, partition_id: &PartitionId) -> StorageResult<Vec<String>>;
}
