//! Entity catalog.
//!
//! The catalog holds every entity declared by the business modules, indexed
//! by name, together with the baseline schema deltas. It is validated once at
//! build time and immutable afterwards; dependency order is computed during
//! the build so the provisioner never has to handle a cycle at runtime.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::entity::{EntityDefinition, PartitionClass};
use super::migration::SchemaDelta;
use crate::error::CatalogError;

/// Collects entity declarations and baseline migrations.
#[derive(Debug, Default)]
pub struct EntityCatalogBuilder {
    entities: Vec<EntityDefinition>,
    migrations: Vec<SchemaDelta>,
}

impl EntityCatalogBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one entity.
    pub fn register(mut self, definition: EntityDefinition) -> Self {
        self.entities.push(definition);
        self
    }

    /// Registers every entity of a business module.
    pub fn register_all<I>(mut self, definitions: I) -> Self
    where
        I: IntoIterator<Item = EntityDefinition>,
    {
        self.entities.extend(definitions);
        self
    }

    /// Registers a delta already reflected in the current definitions.
    ///
    /// Newly provisioned partitions are created from the current definitions
    /// and record these versions as applied; existing partitions receive them
    /// through migration.
    pub fn migration(mut self, delta: SchemaDelta) -> Self {
        self.migrations.push(delta);
        self
    }

    /// Validates the declarations and computes dependency order.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::InvalidName`] for bad entity, module or field names
    /// - [`CatalogError::DuplicateEntity`] if an entity name is declared twice
    /// - [`CatalogError::UnknownReference`] if a reference names no entity
    /// - [`CatalogError::SharedReferencesIsolated`] if a shared entity
    ///   references a per-tenant one
    /// - [`CatalogError::DependencyCycle`] if references form a cycle
    /// - [`CatalogError::DuplicateMigration`] if two deltas share a version
    pub fn build(self) -> Result<EntityCatalog, CatalogError> {
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (index, definition) in self.entities.iter().enumerate() {
            definition.validate()?;
            if by_name.insert(definition.name.clone(), index).is_some() {
                return Err(CatalogError::DuplicateEntity {
                    entity: definition.name.clone(),
                });
            }
        }

        for definition in &self.entities {
            for (_, target) in definition.references() {
                let target_index =
                    by_name
                        .get(target)
                        .copied()
                        .ok_or_else(|| CatalogError::UnknownReference {
                            entity: definition.name.clone(),
                            target: target.to_string(),
                        })?;
                if definition.class == PartitionClass::Shared
                    && self.entities[target_index].class == PartitionClass::Isolated
                {
                    return Err(CatalogError::SharedReferencesIsolated {
                        entity: definition.name.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }

        let mut versions = BTreeSet::new();
        for delta in &self.migrations {
            delta.validate()?;
            if !versions.insert(delta.version.clone()) {
                return Err(CatalogError::DuplicateMigration {
                    version: delta.version.clone(),
                });
            }
        }

        let shared_order = dependency_order(&self.entities, &by_name, PartitionClass::Shared)?;
        let isolated_order = dependency_order(&self.entities, &by_name, PartitionClass::Isolated)?;

        Ok(EntityCatalog {
            entities: self.entities.into_iter().map(Arc::new).collect(),
            by_name,
            shared_order,
            isolated_order,
            migrations: self.migrations,
        })
    }
}

/// Orders the entities of one class so that every entity comes after the
/// entities it references.
///
/// Kahn's algorithm; among entities whose dependencies are satisfied the one
/// declared first wins, so the result is deterministic. References to the
/// other class and self-references add no edge: shared entities are created
/// before any tenant partition exists, and a self-reference does not need an
/// ordering.
fn dependency_order(
    entities: &[EntityDefinition],
    by_name: &HashMap<String, usize>,
    class: PartitionClass,
) -> Result<Vec<usize>, CatalogError> {
    let members: Vec<usize> = (0..entities.len())
        .filter(|&i| entities[i].class == class)
        .collect();

    let mut in_degree: HashMap<usize, usize> = members.iter().map(|&i| (i, 0)).collect();
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();

    for &index in &members {
        let targets: BTreeSet<usize> = entities[index]
            .references()
            .filter_map(|(_, target)| by_name.get(target).copied())
            .filter(|&target| target != index && entities[target].class == class)
            .collect();
        for target in targets {
            dependents.entry(target).or_default().push(index);
            *in_degree.entry(index).or_default() += 1;
        }
    }

    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(&index, _)| index)
        .collect();
    let mut order = Vec::with_capacity(members.len());

    while let Some(index) = ready.pop_first() {
        order.push(index);
        for &dependent in dependents.get(&index).map(Vec::as_slice).unwrap_or_default() {
            if let Some(degree) = in_degree.get_mut(&dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    if order.len() < members.len() {
        let mut cyclic: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(index, _)| entities[index].name.clone())
            .collect();
        cyclic.sort();
        return Err(CatalogError::DependencyCycle { entities: cyclic });
    }

    Ok(order)
}

/// The validated, immutable set of entity declarations.
///
/// # Examples
///
/// ```
/// use realty_persistence::catalog::{EntityCatalog, EntityDefinition, FieldDef, PartitionClass};
///
/// let catalog = EntityCatalog::builder()
///     .register(EntityDefinition::isolated("leasing", "lease")
///         .field(FieldDef::reference("unit_id", "unit").required()))
///     .register(EntityDefinition::isolated("properties", "unit"))
///     .build()
///     .unwrap();
///
/// let order: Vec<&str> = catalog
///     .in_dependency_order(PartitionClass::Isolated)
///     .map(|e| e.name.as_str())
///     .collect();
/// assert_eq!(order, vec!["unit", "lease"]);
/// ```
#[derive(Debug, Clone)]
pub struct EntityCatalog {
    entities: Vec<Arc<EntityDefinition>>,
    by_name: HashMap<String, usize>,
    shared_order: Vec<usize>,
    isolated_order: Vec<usize>,
    migrations: Vec<SchemaDelta>,
}

impl EntityCatalog {
    /// Starts a new catalog.
    pub fn builder() -> EntityCatalogBuilder {
        EntityCatalogBuilder::new()
    }

    /// Returns the number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entities are registered.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Looks up an entity by name.
    pub fn get(&self, name: &str) -> Option<&Arc<EntityDefinition>> {
        self.by_name.get(name).map(|&index| &self.entities[index])
    }

    /// Looks up an entity by module and name, as addressed over HTTP.
    pub fn lookup(&self, module: &str, name: &str) -> Result<&Arc<EntityDefinition>, CatalogError> {
        self.get(name)
            .filter(|definition| definition.module == module)
            .ok_or_else(|| CatalogError::UnknownEntity {
                module: module.to_string(),
                entity: name.to_string(),
            })
    }

    /// Returns the class of an entity.
    pub fn class_of(&self, name: &str) -> Option<PartitionClass> {
        self.get(name).map(|definition| definition.class)
    }

    /// Returns the entities of one class in dependency order.
    pub fn in_dependency_order(
        &self,
        class: PartitionClass,
    ) -> impl Iterator<Item = &Arc<EntityDefinition>> {
        let order = match class {
            PartitionClass::Shared => &self.shared_order,
            PartitionClass::Isolated => &self.isolated_order,
        };
        order.iter().map(|&index| &self.entities[index])
    }

    /// Returns all entities in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDefinition>> {
        self.entities.iter()
    }

    /// Returns the distinct module names in declaration order.
    pub fn modules(&self) -> Vec<&str> {
        let mut modules: Vec<&str> = Vec::new();
        for definition in &self.entities {
            if !modules.contains(&definition.module.as_str()) {
                modules.push(&definition.module);
            }
        }
        modules
    }

    /// Returns the deltas already reflected in the current definitions.
    pub fn baseline_migrations(&self) -> &[SchemaDelta] {
        &self.migrations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, SchemaChange};

    fn names(catalog: &EntityCatalog, class: PartitionClass) -> Vec<String> {
        catalog
            .in_dependency_order(class)
            .map(|e| e.name.clone())
            .collect()
    }

    #[test]
    fn test_dependency_order_ignores_declaration_order() {
        let catalog = EntityCatalog::builder()
            .register(
                EntityDefinition::isolated("maintenance", "work_order")
                    .field(FieldDef::reference("request_id", "maintenance_request"))
                    .field(FieldDef::reference("vendor_id", "vendor")),
            )
            .register(
                EntityDefinition::isolated("maintenance", "maintenance_request")
                    .field(FieldDef::reference("unit_id", "unit")),
            )
            .register(EntityDefinition::isolated("maintenance", "vendor"))
            .register(
                EntityDefinition::isolated("properties", "unit")
                    .field(FieldDef::reference("property_id", "property")),
            )
            .register(EntityDefinition::isolated("properties", "property"))
            .build()
            .unwrap();

        let order = names(&catalog, PartitionClass::Isolated);
        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();

        assert_eq!(order.len(), 5);
        assert!(pos("property") < pos("unit"));
        assert!(pos("unit") < pos("maintenance_request"));
        assert!(pos("maintenance_request") < pos("work_order"));
        assert!(pos("vendor") < pos("work_order"));
    }

    #[test]
    fn test_dependency_order_is_deterministic() {
        let build = || {
            EntityCatalog::builder()
                .register(EntityDefinition::isolated("a", "zeta"))
                .register(EntityDefinition::isolated("a", "alpha"))
                .register(
                    EntityDefinition::isolated("a", "mid")
                        .field(FieldDef::reference("zeta_id", "zeta")),
                )
                .build()
                .unwrap()
        };
        let first = names(&build(), PartitionClass::Isolated);
        assert_eq!(first, vec!["zeta", "alpha", "mid"]);
        assert_eq!(first, names(&build(), PartitionClass::Isolated));
    }

    #[test]
    fn test_classes_are_ordered_separately() {
        let catalog = EntityCatalog::builder()
            .register(
                EntityDefinition::isolated("billing", "invoice")
                    .field(FieldDef::reference("plan_id", "subscription_plan")),
            )
            .register(EntityDefinition::shared("platform", "subscription_plan"))
            .build()
            .unwrap();

        assert_eq!(names(&catalog, PartitionClass::Shared), vec!["subscription_plan"]);
        assert_eq!(names(&catalog, PartitionClass::Isolated), vec!["invoice"]);
        assert_eq!(catalog.class_of("invoice"), Some(PartitionClass::Isolated));
        assert_eq!(catalog.class_of("subscription_plan"), Some(PartitionClass::Shared));
    }

    #[test]
    fn test_self_reference_allowed() {
        let catalog = EntityCatalog::builder()
            .register(
                EntityDefinition::isolated("properties", "property")
                    .field(FieldDef::reference("parent_id", "property")),
            )
            .build()
            .unwrap();
        assert_eq!(names(&catalog, PartitionClass::Isolated), vec!["property"]);
    }

    #[test]
    fn test_cycle_detected() {
        let err = EntityCatalog::builder()
            .register(EntityDefinition::isolated("a", "lease").field(FieldDef::reference("unit_id", "unit")))
            .register(EntityDefinition::isolated("a", "unit").field(FieldDef::reference("lease_id", "lease")))
            .register(EntityDefinition::isolated("a", "vendor"))
            .build()
            .unwrap_err();

        match err {
            CatalogError::DependencyCycle { entities } => {
                assert_eq!(entities, vec!["lease".to_string(), "unit".to_string()]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_reference() {
        let err = EntityCatalog::builder()
            .register(EntityDefinition::isolated("a", "lease").field(FieldDef::reference("unit_id", "unit")))
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownReference { .. }));
    }

    #[test]
    fn test_shared_cannot_reference_isolated() {
        let err = EntityCatalog::builder()
            .register(EntityDefinition::isolated("a", "unit"))
            .register(EntityDefinition::shared("p", "listing_index").field(FieldDef::reference("unit_id", "unit")))
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::SharedReferencesIsolated { .. }));
    }

    #[test]
    fn test_duplicate_entity() {
        let err = EntityCatalog::builder()
            .register(EntityDefinition::isolated("a", "unit"))
            .register(EntityDefinition::shared("b", "unit"))
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateEntity { .. }));
    }

    #[test]
    fn test_duplicate_migration() {
        let delta = SchemaDelta::new("0001").change(SchemaChange::AddField {
            entity: "unit".to_string(),
            field: FieldDef::text("note"),
        });
        let err = EntityCatalog::builder()
            .register(EntityDefinition::isolated("a", "unit"))
            .migration(delta.clone())
            .migration(delta)
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateMigration { .. }));
    }

    #[test]
    fn test_lookup_checks_module() {
        let catalog = EntityCatalog::builder()
            .register(EntityDefinition::isolated("leasing", "lease"))
            .build()
            .unwrap();
        assert!(catalog.lookup("leasing", "lease").is_ok());
        assert!(catalog.lookup("maintenance", "lease").is_err());
        assert!(catalog.lookup("leasing", "unit").is_err());
        assert_eq!(catalog.modules(), vec!["leasing"]);
    }
}
