//! Shared/isolated entity classification.
//!
//! Business modules are registrants against this catalog: each declares its
//! entities as [`PartitionClass::Isolated`] (the default) or
//! [`PartitionClass::Shared`], with typed fields and references. The catalog
//! is consulted by the provisioner to know what to create in a new partition
//! and in which order.
//!
//! # Core Types
//!
//! - [`EntityDefinition`] - An entity with its class and fields
//! - [`EntityCatalog`] - The validated set of definitions with dependency order
//! - [`SchemaDelta`] - A versioned incremental schema change

mod entity;
mod migration;
mod registry;

pub(crate) use entity::validate_identifier;
pub use entity::{
    EntityDefinition, FieldDef, FieldType, PartitionClass, RESERVED_ENTITIES, RESERVED_FIELDS,
};
pub use migration::{AppliedMigration, MigrationOutcome, SchemaChange, SchemaDelta};
pub use registry::{EntityCatalog, EntityCatalogBuilder};
