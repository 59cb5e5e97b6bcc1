//! HTTP request handlers.
//!
//! - [`entities`] - Host-routed business entity access
//! - [`admin`] - Tenant provisioning, domains and migrations
//! - [`health`] - Health, liveness and readiness probes

pub mod admin;
pub mod entities;
pub mod health;

pub use admin::{
    add_domain_handler, deprovision_handler, get_tenant_handler, list_tenants_handler,
    migrate_all_handler, migrate_tenant_handler, provision_handler, remove_domain_handler,
};
pub use entities::{create_entity_handler, current_tenant_handler, list_entities_handler, read_entity_handler};
pub use health::{health_handler, liveness_handler, readiness_handler};
