//! Catalog and backend fixtures.

use std::sync::Arc;

use realty_persistence::backends::sqlite::SqliteBackend;
use realty_persistence::catalog::{
    EntityCatalog, EntityDefinition, FieldDef, SchemaChange, SchemaDelta,
};
use realty_persistence::core::PartitionRegistry;
use realty_persistence::provision::{Provisioner, ProvisioningConfig};
use realty_persistence::tenant::{BoundContext, PartitionRef, RoutingKey, TenantDescriptor};

pub const BASELINE_VERSION: &str = "0001_lease_deposit";

/// A small catalog. Declaration order is deliberately not dependency order.
pub fn test_catalog() -> EntityCatalog {
    EntityCatalog::builder()
        .register(
            EntityDefinition::isolated("leasing", "lease")
                .field(FieldDef::reference("unit_id", "unit").required())
                .field(FieldDef::reference("resident_id", "resident").required())
                .field(FieldDef::timestamp("start_date").required())
                .field(FieldDef::real("monthly_rent").required())
                .field(FieldDef::real("security_deposit")),
        )
        .register(
            EntityDefinition::isolated("properties", "unit")
                .field(FieldDef::reference("property_id", "property").required())
                .field(FieldDef::text("unit_number").required())
                .field(FieldDef::integer("bedrooms"))
                .field(FieldDef::boolean("furnished")),
        )
        .register(
            EntityDefinition::isolated("leasing", "resident")
                .field(FieldDef::text("full_name").required())
                .field(FieldDef::text("email")),
        )
        .register(
            EntityDefinition::isolated("properties", "property")
                .field(FieldDef::text("name").required())
                .field(FieldDef::reference("plan_id", "subscription_plan"))
                .field(FieldDef::json("amenities")),
        )
        .register(
            EntityDefinition::shared("platform", "subscription_plan")
                .field(FieldDef::text("name").required())
                .field(FieldDef::integer("max_units")),
        )
        .migration(SchemaDelta::new(BASELINE_VERSION).change(SchemaChange::AddField {
            entity: "lease".to_string(),
            field: FieldDef::real("security_deposit"),
        }))
        .build()
        .expect("test catalog is valid")
}

/// Creates an initialized in-memory backend.
pub fn create_backend() -> Arc<SqliteBackend> {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    Arc::new(backend)
}

/// Creates a provisioner over a fresh backend, with the shared partition initialized.
pub async fn create_provisioner() -> Provisioner<SqliteBackend> {
    create_provisioner_with(create_backend(), ProvisioningConfig::default()).await
}

/// Creates a provisioner over the given store.
pub async fn create_provisioner_with<S>(store: Arc<S>, config: ProvisioningConfig) -> Provisioner<S>
where
    S: realty_persistence::core::PartitionStore,
{
    let provisioner = Provisioner::new(store, Arc::new(test_catalog()), config);
    provisioner
        .init_shared()
        .await
        .expect("Failed to initialize shared partition");
    provisioner
}

/// Builds a tenant descriptor.
pub fn descriptor(name: &str, domain: &str) -> TenantDescriptor {
    TenantDescriptor::new(
        name,
        format!("ops@{}", domain),
        RoutingKey::parse(domain).expect("valid test domain"),
    )
}

/// Binds a context the way the router does.
pub fn bind<R: PartitionRegistry>(registry: &R, partition: PartitionRef) -> BoundContext {
    BoundContext::bind(partition, registry.shared_partition().clone())
        .expect("partition is ready")
}

/// Resolves a host and binds a context for it.
pub async fn bind_host<R: PartitionRegistry>(registry: &R, host: &str) -> BoundContext {
    let key = RoutingKey::parse(host).expect("valid test host");
    let partition = registry
        .resolve(&key)
        .await
        .expect("resolve succeeds")
        .expect("host is registered");
    bind(registry, partition)
}

/// Creates an initialized file-backed database inside `dir`.
///
/// Used where real connection concurrency matters; the in-memory backend
/// runs on a single connection.
pub fn create_file_backend(dir: &tempfile::TempDir) -> Arc<SqliteBackend> {
    let backend =
        SqliteBackend::open(dir.path().join("realty.db")).expect("Failed to open SQLite file");
    backend.init_schema().expect("Failed to initialize schema");
    Arc::new(backend)
}
