//! Built-in real-estate entity catalog.
//!
//! Business modules register their entities here. `subscription_plan` is
//! platform-wide and lives in the shared partition; everything else is
//! tenant business data.

use realty_persistence::catalog::{
    EntityCatalog, EntityDefinition, FieldDef, SchemaChange, SchemaDelta,
};
use realty_persistence::error::CatalogError;

/// Version label of the baseline delta recorded on new partitions.
pub const BASELINE_VERSION: &str = "0001_lease_terms";

fn platform() -> Vec<EntityDefinition> {
    vec![
        EntityDefinition::shared("platform", "subscription_plan")
            .field(FieldDef::text("name").required())
            .field(FieldDef::integer("max_units"))
            .field(FieldDef::real("monthly_price")),
    ]
}

fn properties() -> Vec<EntityDefinition> {
    vec![
        EntityDefinition::isolated("properties", "property")
            .field(FieldDef::text("name").required())
            .field(FieldDef::text("address"))
            .field(FieldDef::text("property_type"))
            .field(FieldDef::reference("plan_id", "subscription_plan"))
            .field(FieldDef::json("amenities")),
        EntityDefinition::isolated("properties", "unit")
            .field(FieldDef::reference("property_id", "property").required())
            .field(FieldDef::text("unit_number").required())
            .field(FieldDef::integer("bedrooms"))
            .field(FieldDef::real("bathrooms"))
            .field(FieldDef::real("square_feet"))
            .field(FieldDef::boolean("furnished")),
        EntityDefinition::isolated("properties", "listing")
            .field(FieldDef::reference("unit_id", "unit").required())
            .field(FieldDef::real("asking_rent").required())
            .field(FieldDef::timestamp("available_from"))
            .field(FieldDef::boolean("published")),
    ]
}

fn leasing() -> Vec<EntityDefinition> {
    vec![
        EntityDefinition::isolated("leasing", "resident")
            .field(FieldDef::text("full_name").required())
            .field(FieldDef::text("email"))
            .field(FieldDef::text("phone")),
        EntityDefinition::isolated("leasing", "lease")
            .field(FieldDef::reference("unit_id", "unit").required())
            .field(FieldDef::reference("resident_id", "resident").required())
            .field(FieldDef::timestamp("start_date").required())
            .field(FieldDef::timestamp("end_date"))
            .field(FieldDef::real("monthly_rent").required())
            .field(FieldDef::real("security_deposit")),
    ]
}

fn maintenance() -> Vec<EntityDefinition> {
    vec![
        EntityDefinition::isolated("maintenance", "vendor")
            .field(FieldDef::text("company_name").required())
            .field(FieldDef::text("trade"))
            .field(FieldDef::text("contact_email")),
        EntityDefinition::isolated("maintenance", "maintenance_request")
            .field(FieldDef::reference("unit_id", "unit").required())
            .field(FieldDef::reference("resident_id", "resident"))
            .field(FieldDef::text("description").required())
            .field(FieldDef::text("priority"))
            .field(FieldDef::text("status")),
        EntityDefinition::isolated("maintenance", "work_order")
            .field(FieldDef::reference("request_id", "maintenance_request").required())
            .field(FieldDef::reference("vendor_id", "vendor"))
            .field(FieldDef::timestamp("scheduled_for"))
            .field(FieldDef::real("cost"))
            .field(FieldDef::boolean("completed")),
    ]
}

fn baseline() -> SchemaDelta {
    SchemaDelta::new(BASELINE_VERSION)
        .change(SchemaChange::AddField {
            entity: "lease".to_string(),
            field: FieldDef::timestamp("end_date"),
        })
        .change(SchemaChange::AddField {
            entity: "lease".to_string(),
            field: FieldDef::real("security_deposit"),
        })
}

/// Builds the catalog of every business module.
///
/// # Errors
///
/// Returns a [`CatalogError`] if the definitions are inconsistent.
pub fn realty_catalog() -> Result<EntityCatalog, CatalogError> {
    EntityCatalog::builder()
        .register_all(platform())
        .register_all(properties())
        .register_all(leasing())
        .register_all(maintenance())
        .migration(baseline())
        .build()
}
