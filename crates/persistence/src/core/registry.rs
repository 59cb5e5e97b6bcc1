//! Partition registry trait.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::tenant::{
    Domain, PartitionId, PartitionRecord, PartitionRef, PartitionStatus, RoutingKey, Tenant,
    TenantId,
};

/// Durable mapping from routing keys to partitions.
///
/// The registry lives in the shared partition. Every write is durable and
/// transactional: readers never observe a partially committed entry, and
/// writes for the same routing key are linearizable.
///
/// # Example
///
/// ```ignore
/// use realty_persistence::core::PartitionRegistry;
/// use realty_persistence::tenant::RoutingKey;
///
/// async fn lookup<R: PartitionRegistry>(registry: &R) {
///     let host = RoutingKey::parse("acme.example.com").unwrap();
///     match registry.resolve(&host).await.unwrap() {
///         Some(partition) => println!("routed to {}", partition.partition_id),
///         None => println!("unknown tenant"),
///     }
/// }
/// ```
#[async_trait]
pub trait PartitionRegistry: Send + Sync {
    /// Returns the shared partition holding the registry.
    fn shared_partition(&self) -> &PartitionId;

    /// Resolves a routing key to a partition.
    ///
    /// Runs on every request and is a single indexed lookup. Returns `None`
    /// unless the domain is registered, its tenant is active, and the
    /// tenant's partition is [`PartitionStatus::Ready`].
    async fn resolve(&self, routing_key: &RoutingKey) -> StorageResult<Option<PartitionRef>>;

    /// Maps a routing key to a tenant.
    ///
    /// Re-registering a key for the tenant that already owns it is a no-op
    /// (apart from promoting it to primary when requested). When `primary`
    /// is set the tenant's other domains are demoted.
    ///
    /// # Errors
    ///
    /// - [`TenantError::DuplicateDomain`](crate::error::TenantError::DuplicateDomain)
    ///   if another tenant owns the key
    /// - [`TenantError::TenantNotFound`](crate::error::TenantError::TenantNotFound)
    ///   if the tenant does not exist
    /// - [`TenantError::TenantInactive`](crate::error::TenantError::TenantInactive)
    ///   if the tenant was deprovisioned
    /// - [`ProvisioningError::InvalidState`](crate::error::ProvisioningError::InvalidState)
    ///   if the tenant's partition is not ready, so a pending or failed
    ///   partition is never referenced by a routing entry
    async fn register(
        &self,
        tenant_id: &TenantId,
        routing_key: &RoutingKey,
        primary: bool,
    ) -> StorageResult<Domain>;

    /// Removes a routing entry. The partition is untouched.
    ///
    /// # Errors
    ///
    /// [`TenantError::DomainNotFound`](crate::error::TenantError::DomainNotFound)
    /// if the key is not registered.
    async fn deregister(&self, routing_key: &RoutingKey) -> StorageResult<Domain>;

    /// Returns the routing entry for a key.
    async fn domain(&self, routing_key: &RoutingKey) -> StorageResult<Option<Domain>>;

    /// Returns a tenant's routing entries, primary first.
    async fn domains(&self, tenant_id: &TenantId) -> StorageResult<Vec<Domain>>;

    /// Returns a tenant.
    async fn tenant(&self, tenant_id: &TenantId) -> StorageResult<Option<Tenant>>;

    /// Returns all tenants ordered by identifier.
    async fn list_tenants(&self) -> StorageResult<Vec<Tenant>>;

    /// Returns a partition record.
    async fn partition(&self, partition_id: &PartitionId) -> StorageResult<Option<PartitionRecord>>;

    /// Returns tenant partitions, optionally filtered by status.
    async fn list_partitions(
        &self,
        status: Option<PartitionStatus>,
    ) -> StorageResult<Vec<PartitionRecord>>;
}
