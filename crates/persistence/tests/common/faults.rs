//! Fault injection for provisioning tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use realty_persistence::backends::sqlite::SqliteBackend;
use realty_persistence::catalog::{
    AppliedMigration, EntityDefinition, MigrationOutcome, SchemaDelta,
};
use realty_persistence::core::{PartitionRegistry, PartitionStore};
use realty_persistence::error::{BackendError, StorageError, StorageResult};
use realty_persistence::strategy::SchemaPerTenantStrategy;
use realty_persistence::tenant::{
    Domain, PartitionId, PartitionRecord, PartitionRef, PartitionStatus, RoutingKey, Tenant,
    TenantId,
};

/// A fault to inject into `apply_definition`.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Fail when this entity is applied.
    FailOn(String),
    /// Sleep before every definition.
    Delay(Duration),
    /// Sleep before every definition of one partition.
    DelayFor { partition: String, delay: Duration },
    /// Register a domain to another tenant while a partition is being built.
    /// Fires once.
    ClaimDomain { domain: String, tenant: String },
}

/// A store that delegates to SQLite and injects faults while building partitions.
pub struct FaultyStore {
    inner: Arc<SqliteBackend>,
    fault: Mutex<Option<Fault>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<SqliteBackend>) -> Self {
        Self {
            inner,
            fault: Mutex::new(None),
        }
    }

    pub fn inject(&self, fault: Fault) {
        *self.fault.lock() = Some(fault);
    }

    pub fn clear(&self) {
        *self.fault.lock() = None;
    }

    pub fn inner(&self) -> &Arc<SqliteBackend> {
        &self.inner
    }
}

#[async_trait]
impl PartitionRegistry for FaultyStore {
    fn shared_partition(&self) -> &PartitionId {
        self.inner.shared_partition()
    }

    async fn resolve(&self, routing_key: &RoutingKey) -> StorageResult<Option<PartitionRef>> {
        self.inner.resolve(routing_key).await
    }

    async fn register(
        &self,
        tenant_id: &TenantId,
        routing_key: &RoutingKey,
        primary: bool,
    ) -> StorageResult<Domain> {
        self.inner.register(tenant_id, routing_key, primary).await
    }

    async fn deregister(&self, routing_key: &RoutingKey) -> StorageResult<Domain> {
        self.inner.deregister(routing_key).await
    }

    async fn domain(&self, routing_key: &RoutingKey) -> StorageResult<Option<Domain>> {
        self.inner.domain(routing_key).await
    }

    async fn domains(&self, tenant_id: &TenantId) -> StorageResult<Vec<Domain>> {
        self.inner.domains(tenant_id).await
    }

    async fn tenant(&self, tenant_id: &TenantId) -> StorageResult<Option<Tenant>> {
        self.inner.tenant(tenant_id).await
    }

    async fn list_tenants(&self) -> StorageResult<Vec<Tenant>> {
        self.inner.list_tenants().await
    }

    async fn partition(&self, partition_id: &PartitionId) -> StorageResult<Option<PartitionRecord>> {
        self.inner.partition(partition_id).await
    }

    async fn list_partitions(
        &self,
        status: Option<PartitionStatus>,
    ) -> StorageResult<Vec<PartitionRecord>> {
        self.inner.list_partitions(status).await
    }
}

#[async_trait]
impl PartitionStore for FaultyStore {
    fn strategy(&self) -> &SchemaPerTenantStrategy {
        self.inner.strategy()
    }

    async fn create_tenant_partition(&self, tenant: &Tenant) -> StorageResult<PartitionRecord> {
        self.inner.create_tenant_partition(tenant).await
    }

    async fn transition_partition(
        &self,
        partition_id: &PartitionId,
        from: &[PartitionStatus],
        to: PartitionStatus,
        last_error: Option<&str>,
    ) -> StorageResult<bool> {
        self.inner
            .transition_partition(partition_id, from, to, last_error)
            .await
    }

    async fn set_tenant_active(&self, tenant_id: &TenantId, active: bool) -> StorageResult<()> {
        self.inner.set_tenant_active(tenant_id, active).await
    }

    async fn create_partition(&self, partition_id: &PartitionId) -> StorageResult<()> {
        self.inner.create_partition(partition_id).await
    }

    async fn apply_definition(
        &self,
        partition_id: &PartitionId,
        definition: &EntityDefinition,
    ) -> StorageResult<()> {
        let fault = self.fault.lock().clone();
        if partition_id != self.inner.shared_partition() {
            match fault {
                Some(Fault::ClaimDomain { domain, tenant }) => {
                    self.clear();
                    self.inner
                        .register(&TenantId::new(tenant), &RoutingKey::parse(&domain)?, false)
                        .await?;
                }
                Some(Fault::FailOn(entity)) if entity == definition.name => {
                    return Err(StorageError::Backend(BackendError::QueryError {
                        message: format!("injected failure creating {}", entity),
                    }));
                }
                Some(Fault::Delay(delay)) => tokio::time::sleep(delay).await,
                Some(Fault::DelayFor { partition, delay }) if partition == partition_id.as_str() => {
                    tokio::time::sleep(delay).await
                }
                _ => {}
            }
        }
        self.inner.apply_definition(partition_id, definition).await
    }

    async fn record_baseline(
        &self,
        partition_id: &PartitionId,
        delta: &SchemaDelta,
    ) -> StorageResult<()> {
        self.inner.record_baseline(partition_id, delta).await
    }

    async fn apply_delta(
        &self,
        partition_id: &PartitionId,
        delta: &SchemaDelta,
    ) -> StorageResult<MigrationOutcome> {
        self.inner.apply_delta(partition_id, delta).await
    }

    async fn applied_migrations(
        &self,
        partition_id: &PartitionId,
    ) -> StorageResult<Vec<AppliedMigration>> {
        self.inner.applied_migrations(partition_id).await
    }

    async fn entity_tables(&self, partition_id: &PartitionId) -> StorageResult<Vec<String>> {
        self.inner.entity_tables(partition_id).await
    }
}
