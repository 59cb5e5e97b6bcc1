//! The partition provisioner.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::config::ProvisioningConfig;
use super::in_flight::InFlight;
use crate::catalog::{EntityCatalog, MigrationOutcome, PartitionClass, SchemaChange, SchemaDelta};
use crate::core::PartitionStore;
use crate::error::{
    MigrationError, ProvisioningError, StorageError, StorageResult, TenantError, ValidationError,
};
use crate::tenant::{
    PartitionId, PartitionRecord, PartitionRef, PartitionStatus, Tenant, TenantDescriptor,
    TenantId,
};

/// A partition a fan-out migration could not be applied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFailure {
    /// The partition that failed.
    pub partition_id: PartitionId,
    /// Error message.
    pub error: String,
}

/// Per-partition outcome of [`Provisioner::migrate_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// The delta version.
    pub version: String,
    /// Partitions the delta was applied to by this call.
    pub applied: Vec<PartitionId>,
    /// Partitions that already had the delta.
    pub already_applied: Vec<PartitionId>,
    /// Partitions that failed.
    pub failed: Vec<MigrationFailure>,
    /// Partitions still being provisioned when the fan-out started. They
    /// only carry the catalog baseline; re-run the fan-out once they are
    /// `ready`.
    #[serde(default)]
    pub pending: Vec<PartitionId>,
}

impl MigrationReport {
    fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            applied: Vec::new(),
            already_applied: Vec::new(),
            failed: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Returns `true` if no partition failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Returns `true` if no partition failed and none was left behind
    /// mid-provisioning.
    pub fn is_complete(&self) -> bool {
        self.is_success() && self.pending.is_empty()
    }
}

/// Creates, migrates and deactivates tenant partitions.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use realty_persistence::backends::sqlite::SqliteBackend;
/// use realty_persistence::catalog::{EntityCatalog, EntityDefinition};
/// use realty_persistence::provision::{Provisioner, ProvisioningConfig};
/// use realty_persistence::tenant::{RoutingKey, TenantDescriptor};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = Arc::new(SqliteBackend::in_memory()?);
/// backend.init_schema()?;
///
/// let catalog = Arc::new(
///     EntityCatalog::builder()
///         .register(EntityDefinition::isolated("properties", "property"))
///         .build()?,
/// );
/// let provisioner = Provisioner::new(backend, catalog, ProvisioningConfig::default());
/// provisioner.init_shared().await?;
///
/// let descriptor = TenantDescriptor::new(
///     "Acme",
///     "ops@acme.example.com",
///     RoutingKey::parse("acme.example.com")?,
/// );
/// let partition = provisioner.provision(&descriptor).await?;
/// assert_eq!(partition.partition_id.as_str(), "tenant_acme");
/// # Ok(())
/// # }
/// ```
pub struct Provisioner<S> {
    store: Arc<S>,
    catalog: Arc<EntityCatalog>,
    config: ProvisioningConfig,
    in_flight: InFlight,
}

impl<S> std::fmt::Debug for Provisioner<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("config", &self.config)
            .field("entities", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

impl<S: PartitionStore> Provisioner<S> {
    /// Creates a provisioner over a store and a catalog.
    pub fn new(store: Arc<S>, catalog: Arc<EntityCatalog>, config: ProvisioningConfig) -> Self {
        Self {
            store,
            catalog,
            config,
            in_flight: InFlight::default(),
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the entity catalog.
    pub fn catalog(&self) -> &Arc<EntityCatalog> {
        &self.catalog
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    /// Returns the number of tenants with a provisioning or migration call in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Creates the shared entity tables in the shared partition.
    ///
    /// Run once at startup, after the registry schema exists.
    pub async fn init_shared(&self) -> StorageResult<()> {
        let shared = self.store.shared_partition().clone();
        self.store.create_partition(&shared).await?;
        for definition in self.catalog.in_dependency_order(PartitionClass::Shared) {
            self.store.apply_definition(&shared, definition).await?;
        }
        tracing::info!(partition = %shared, "Shared partition initialized");
        Ok(())
    }

    /// Provisions a tenant and registers its initial domain.
    ///
    /// The call is idempotent per tenant: a `ready` tenant is returned as
    /// is, and a `failed` or abandoned `pending` partition is rebuilt from
    /// scratch under the same identifier. A descriptor only counts as the
    /// same tenant when its display name and contact email match the
    /// stored tenant.
    ///
    /// # Errors
    ///
    /// - [`TenantError::NameTaken`] if another organization already holds
    ///   the canonical identifier
    /// - [`TenantError::DuplicateDomain`] if another tenant owns the domain;
    ///   nothing is created
    /// - [`TenantError::TenantInactive`] if the tenant was deprovisioned
    /// - [`ProvisioningError::PartitionIdExhausted`] if every candidate
    ///   identifier is taken
    /// - [`ProvisioningError::Failed`] or [`ProvisioningError::TimedOut`] if
    ///   the partition could not be built; it is left `failed`
    /// - [`ProvisioningError::DomainUnassigned`] if the domain was claimed
    ///   while the partition was being built; the tenant stays `ready`
    pub async fn provision(&self, descriptor: &TenantDescriptor) -> StorageResult<PartitionRef> {
        let tenant_id = descriptor.tenant_id()?;
        let _guard = self.in_flight.acquire(&tenant_id).await;

        let existing = self.store.tenant(&tenant_id).await?;
        if let Some(tenant) = &existing {
            if !tenant.is_described_by(descriptor) {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    name = %descriptor.name,
                    "Provisioning rejected: identifier held by another organization"
                );
                return Err(TenantError::NameTaken {
                    name: descriptor.name.clone(),
                    tenant_id,
                }
                .into());
            }
        }

        if let Some(owner) = self.store.domain(&descriptor.domain).await? {
            if owner.tenant_id != tenant_id {
                return Err(TenantError::DuplicateDomain {
                    domain: descriptor.domain.to_string(),
                    existing_tenant: owner.tenant_id,
                }
                .into());
            }
        }

        let partition_id = match existing {
            Some(tenant) => {
                if !tenant.active {
                    return Err(TenantError::TenantInactive { tenant_id }.into());
                }
                let record = self.require_partition(&tenant.partition_id).await?;
                match record.status {
                    PartitionStatus::Ready => {
                        self.register_domain(&tenant_id, descriptor).await?;
                        return Ok(PartitionRef {
                            tenant_id,
                            partition_id: record.partition_id,
                            status: PartitionStatus::Ready,
                        });
                    }
                    PartitionStatus::Inactive => {
                        return Err(TenantError::TenantInactive { tenant_id }.into());
                    }
                    PartitionStatus::Failed | PartitionStatus::Pending => {
                        let reset = self
                            .store
                            .transition_partition(
                                &record.partition_id,
                                &[PartitionStatus::Failed, PartitionStatus::Pending],
                                PartitionStatus::Pending,
                                None,
                            )
                            .await?;
                        if !reset {
                            return Err(ProvisioningError::InProgress { tenant_id }.into());
                        }
                        tracing::info!(
                            tenant_id = %tenant_id,
                            partition = %record.partition_id,
                            previous = %record.status,
                            "Retrying partition provisioning"
                        );
                        record.partition_id
                    }
                }
            }
            None => self.allocate(&tenant_id, descriptor).await?.partition_id,
        };

        self.build(&tenant_id, &partition_id).await?;
        self.register_domain(&tenant_id, descriptor)
            .await
            .map_err(|e| match e {
                StorageError::Tenant(TenantError::DuplicateDomain {
                    domain,
                    existing_tenant,
                }) => {
                    tracing::warn!(
                        target: "realty::provisioning",
                        tenant_id = %tenant_id,
                        partition = %partition_id,
                        domain = %domain,
                        "Initial domain taken during provisioning; tenant has no routing entry"
                    );
                    ProvisioningError::DomainUnassigned {
                        tenant_id: tenant_id.clone(),
                        partition_id: partition_id.clone(),
                        domain,
                        existing_tenant,
                    }
                    .into()
                }
                other => other,
            })?;

        tracing::info!(tenant_id = %tenant_id, partition = %partition_id, "Tenant provisioned");
        Ok(PartitionRef {
            tenant_id,
            partition_id,
            status: PartitionStatus::Ready,
        })
    }

    /// Returns the current partition reference of a tenant.
    pub async fn partition_ref(&self, tenant_id: &TenantId) -> StorageResult<PartitionRef> {
        let tenant = self.store.tenant(tenant_id).await?.ok_or_else(|| {
            TenantError::TenantNotFound {
                tenant_id: tenant_id.clone(),
            }
        })?;
        let record = self.require_partition(&tenant.partition_id).await?;
        Ok(PartitionRef {
            tenant_id: tenant.tenant_id,
            partition_id: record.partition_id,
            status: record.status,
        })
    }

    /// Applies a schema delta to one tenant partition.
    ///
    /// Re-applying a delta already in the partition's ledger returns
    /// [`MigrationOutcome::AlreadyApplied`].
    ///
    /// # Errors
    ///
    /// - [`MigrationError::PartitionNotMigratable`] unless the partition is
    ///   `ready` or `inactive`
    /// - [`MigrationError::ChecksumMismatch`] / [`MigrationError::OutOfOrder`]
    ///   from the ledger check
    pub async fn migrate(
        &self,
        partition: &PartitionRef,
        delta: &SchemaDelta,
    ) -> StorageResult<MigrationOutcome> {
        self.validate_delta(delta)?;
        let _guard = self.in_flight.acquire(&partition.tenant_id).await;

        let record = self.require_partition(&partition.partition_id).await?;
        if record.tenant_id.as_ref() != Some(&partition.tenant_id)
            || !matches!(
                record.status,
                PartitionStatus::Ready | PartitionStatus::Inactive
            )
        {
            return Err(MigrationError::PartitionNotMigratable {
                partition_id: record.partition_id,
                status: record.status,
            }
            .into());
        }

        self.store.apply_delta(&record.partition_id, delta).await
    }

    /// Applies a schema delta to every `ready` partition, one at a time.
    ///
    /// A failure in one partition is recorded and does not stop the others.
    /// Partitions that are `pending` when the fan-out starts are listed in
    /// [`MigrationReport::pending`] rather than migrated.
    pub async fn migrate_all(&self, delta: &SchemaDelta) -> StorageResult<MigrationReport> {
        self.validate_delta(delta)?;

        let partitions = self
            .store
            .list_partitions(Some(PartitionStatus::Ready))
            .await?;
        let mut report = MigrationReport::new(&delta.version);
        report.pending = self
            .store
            .list_partitions(Some(PartitionStatus::Pending))
            .await?
            .into_iter()
            .filter(|record| record.tenant_id.is_some())
            .map(|record| record.partition_id)
            .collect();

        for record in partitions {
            let Some(partition) = record.to_ref() else {
                continue;
            };
            match self.migrate(&partition, delta).await {
                Ok(MigrationOutcome::Applied) => report.applied.push(partition.partition_id),
                Ok(MigrationOutcome::AlreadyApplied) => {
                    report.already_applied.push(partition.partition_id)
                }
                Err(e) => {
                    tracing::error!(
                        target: "realty::provisioning",
                        partition = %partition.partition_id,
                        version = %delta.version,
                        error = %e,
                        "Migration failed"
                    );
                    report.failed.push(MigrationFailure {
                        partition_id: partition.partition_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            version = %delta.version,
            applied = report.applied.len(),
            already_applied = report.already_applied.len(),
            failed = report.failed.len(),
            "Migration fan-out finished"
        );
        if !report.pending.is_empty() {
            tracing::warn!(
                target: "realty::provisioning",
                version = %delta.version,
                pending = ?report.pending,
                "Partitions were mid-provisioning during fan-out; re-run once they are ready"
            );
        }
        Ok(report)
    }

    /// Marks a tenant and its partition inactive.
    ///
    /// The tenant stops resolving immediately. No table is dropped; physical
    /// teardown is left to an operator.
    pub async fn deprovision(&self, partition: &PartitionRef) -> StorageResult<PartitionRef> {
        let _guard = self.in_flight.acquire(&partition.tenant_id).await;

        let record = self.require_partition(&partition.partition_id).await?;
        if record.tenant_id.as_ref() != Some(&partition.tenant_id) {
            return Err(TenantError::PartitionNotFound {
                partition_id: partition.partition_id.clone(),
            }
            .into());
        }

        self.store
            .set_tenant_active(&partition.tenant_id, false)
            .await?;
        self.store
            .transition_partition(
                &partition.partition_id,
                &[
                    PartitionStatus::Pending,
                    PartitionStatus::Ready,
                    PartitionStatus::Failed,
                ],
                PartitionStatus::Inactive,
                None,
            )
            .await?;

        tracing::warn!(
            tenant_id = %partition.tenant_id,
            partition = %partition.partition_id,
            "Tenant deprovisioned; partition data retained"
        );
        Ok(PartitionRef {
            tenant_id: partition.tenant_id.clone(),
            partition_id: partition.partition_id.clone(),
            status: PartitionStatus::Inactive,
        })
    }

    async fn require_partition(&self, partition_id: &PartitionId) -> StorageResult<PartitionRecord> {
        self.store.partition(partition_id).await?.ok_or_else(|| {
            TenantError::PartitionNotFound {
                partition_id: partition_id.clone(),
            }
            .into()
        })
    }

    /// Records the tenant with the first free candidate identifier.
    async fn allocate(
        &self,
        tenant_id: &TenantId,
        descriptor: &TenantDescriptor,
    ) -> StorageResult<PartitionRecord> {
        let strategy = self.store.strategy();

        for attempt in 1..=self.config.max_collision_suffix.max(1) {
            let candidate = strategy.candidate(tenant_id, attempt)?;
            if self.store.partition(&candidate).await?.is_some() {
                continue;
            }

            let tenant = Tenant {
                tenant_id: tenant_id.clone(),
                partition_id: candidate.clone(),
                display_name: descriptor.name.trim().to_string(),
                contact_email: descriptor.contact_email.trim().to_string(),
                address: descriptor.address.clone(),
                phone: descriptor.phone.clone(),
                active: true,
                created_at: Utc::now(),
            };
            match self.store.create_tenant_partition(&tenant).await {
                Ok(record) => {
                    tracing::info!(
                        tenant_id = %tenant_id,
                        partition = %candidate,
                        attempt,
                        "Allocated partition"
                    );
                    return Ok(record);
                }
                Err(StorageError::Provisioning(ProvisioningError::PartitionTaken { .. })) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(ProvisioningError::PartitionIdExhausted {
            base: strategy.base_schema_name(tenant_id),
        }
        .into())
    }

    /// Builds a `pending` partition within the time budget and marks the
    /// outcome.
    async fn build(&self, tenant_id: &TenantId, partition_id: &PartitionId) -> StorageResult<()> {
        let budget = self.config.timeout();
        let outcome = tokio::time::timeout(budget, self.apply_schema(partition_id)).await;

        let (message, error) = match outcome {
            Ok(Ok(())) => {
                let ready = self
                    .store
                    .transition_partition(
                        partition_id,
                        &[PartitionStatus::Pending],
                        PartitionStatus::Ready,
                        None,
                    )
                    .await?;
                if ready {
                    return Ok(());
                }
                let status = self.require_partition(partition_id).await?.status;
                return Err(ProvisioningError::InvalidState {
                    partition_id: partition_id.clone(),
                    status,
                }
                .into());
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                let error = ProvisioningError::Failed {
                    tenant_id: tenant_id.clone(),
                    partition_id: partition_id.clone(),
                    message: message.clone(),
                };
                (message, error)
            }
            Err(_) => {
                let error = ProvisioningError::TimedOut {
                    tenant_id: tenant_id.clone(),
                    partition_id: partition_id.clone(),
                    budget_ms: self.config.timeout_ms,
                };
                (error.to_string(), error)
            }
        };

        tracing::error!(
            target: "realty::provisioning",
            tenant_id = %tenant_id,
            partition = %partition_id,
            error = %message,
            "Partition provisioning failed"
        );
        if let Err(e) = self
            .store
            .transition_partition(
                partition_id,
                &[PartitionStatus::Pending],
                PartitionStatus::Failed,
                Some(&message),
            )
            .await
        {
            tracing::error!(
                target: "realty::provisioning",
                partition = %partition_id,
                error = %e,
                "Could not mark partition failed"
            );
        }
        Err(error.into())
    }

    /// Creates the partition and every isolated entity in dependency order,
    /// then records the catalog's deltas as the partition's baseline.
    async fn apply_schema(&self, partition_id: &PartitionId) -> StorageResult<()> {
        self.store.create_partition(partition_id).await?;
        tokio::task::yield_now().await;

        for definition in self.catalog.in_dependency_order(PartitionClass::Isolated) {
            self.store.apply_definition(partition_id, definition).await?;
            tokio::task::yield_now().await;
        }
        for delta in self.catalog.baseline_migrations() {
            self.store.record_baseline(partition_id, delta).await?;
        }
        Ok(())
    }

    /// Registers the descriptor's domain, as primary if the tenant has none.
    async fn register_domain(
        &self,
        tenant_id: &TenantId,
        descriptor: &TenantDescriptor,
    ) -> StorageResult<()> {
        let has_primary = self
            .store
            .domains(tenant_id)
            .await?
            .iter()
            .any(|d| d.primary && d.routing_key != descriptor.domain);
        self.store
            .register(tenant_id, &descriptor.domain, !has_primary)
            .await?;
        Ok(())
    }

    fn validate_delta(&self, delta: &SchemaDelta) -> StorageResult<()> {
        delta.validate()?;
        for change in &delta.changes {
            if let SchemaChange::CreateEntity { definition } = change {
                if definition.class == PartitionClass::Shared {
                    return Err(ValidationError::InvalidRecord {
                        entity: definition.name.clone(),
                        message: "tenant migrations cannot create shared entities".to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}
