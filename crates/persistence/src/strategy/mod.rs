//! Tenancy isolation strategy.
//!
//! Tenant data is isolated schema-per-tenant: every tenant partition holds
//! one independent copy of every isolated entity table, and a single shared
//! schema holds the tenant registry and the shared entities. There is no
//! row-level tenant filtering anywhere.
//!
//! | Partition | Contents |
//! |-----------|----------|
//! | `shared` | tenants, domains, partitions, shared entities |
//! | `tenant_<id>` | isolated entity tables, migration ledger |
//!
//! # Example
//!
//! ```
//! use realty_persistence::strategy::{SchemaPerTenantConfig, SchemaPerTenantStrategy};
//! use realty_persistence::tenant::TenantId;
//!
//! let strategy = SchemaPerTenantStrategy::new(SchemaPerTenantConfig::default()).unwrap();
//! let partition = strategy.candidate(&TenantId::new("acme"), 1).unwrap();
//! assert_eq!(partition.as_str(), "tenant_acme");
//! assert_eq!(strategy.table_name(&partition, "lease"), "tenant_acme__lease");
//! ```

mod schema_per_tenant;

pub use schema_per_tenant::{
    SchemaPerTenantConfig, SchemaPerTenantStrategy, TABLE_SEPARATOR, escape_identifier,
    physical_table,
};
