//! Schema deltas.
//!
//! A [`SchemaDelta`] is an incremental change to every isolated partition.
//! Each partition keeps a ledger of applied versions together with the
//! fingerprint of the changes, which is what makes re-application safe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{EntityDefinition, FieldDef, validate_identifier};
use crate::error::CatalogError;

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaChange {
    /// Creates a new entity table.
    CreateEntity { definition: EntityDefinition },

    /// Adds a nullable column to an existing entity.
    AddField { entity: String, field: FieldDef },

    /// Creates an index over one or more fields.
    CreateIndex {
        entity: String,
        name: String,
        fields: Vec<String>,
        #[serde(default)]
        unique: bool,
    },
}

impl SchemaChange {
    /// Returns the entity this change touches.
    pub fn entity(&self) -> &str {
        match self {
            SchemaChange::CreateEntity { definition } => &definition.name,
            SchemaChange::AddField { entity, .. } => entity,
            SchemaChange::CreateIndex { entity, .. } => entity,
        }
    }
}

/// A versioned set of schema changes.
///
/// # Examples
///
/// ```
/// use realty_persistence::catalog::{FieldDef, SchemaChange, SchemaDelta};
///
/// let delta = SchemaDelta::new("2024_06_lease_deposit").change(SchemaChange::AddField {
///     entity: "lease".to_string(),
///     field: FieldDef::real("security_deposit"),
/// });
///
/// assert_eq!(delta.fingerprint(), delta.clone().fingerprint());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDelta {
    /// Unique version label.
    pub version: String,
    /// Version that must already be applied.
    #[serde(default)]
    pub requires: Option<String>,
    /// Changes, applied in order within one transaction.
    pub changes: Vec<SchemaChange>,
}

impl SchemaDelta {
    /// Creates an empty delta.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            requires: None,
            changes: Vec::new(),
        }
    }

    /// Sets the prerequisite version.
    pub fn requires(mut self, version: impl Into<String>) -> Self {
        self.requires = Some(version.into());
        self
    }

    /// Appends a change.
    pub fn change(mut self, change: SchemaChange) -> Self {
        self.changes.push(change);
        self
    }

    /// Returns a stable fingerprint of the change set.
    ///
    /// Two deltas with the same version are the same migration only if their
    /// fingerprints match.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(&self.changes).unwrap_or_default()
    }

    /// Checks version label and identifier names.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let version_ok = !self.version.is_empty()
            && self.version.len() <= 128
            && self
                .version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !version_ok {
            return Err(CatalogError::InvalidName {
                name: self.version.clone(),
                message: "migration versions use ASCII letters, digits, '_', '-' and '.'"
                    .to_string(),
            });
        }
        if self.changes.is_empty() {
            return Err(CatalogError::InvalidName {
                name: self.version.clone(),
                message: "migration has no changes".to_string(),
            });
        }

        for change in &self.changes {
            match change {
                SchemaChange::CreateEntity { definition } => definition.validate()?,
                SchemaChange::AddField { entity, field } => {
                    validate_identifier(entity)?;
                    validate_identifier(&field.name)?;
                }
                SchemaChange::CreateIndex {
                    entity,
                    name,
                    fields,
                    ..
                } => {
                    validate_identifier(entity)?;
                    validate_identifier(name)?;
                    if fields.is_empty() {
                        return Err(CatalogError::InvalidName {
                            name: name.clone(),
                            message: "index has no fields".to_string(),
                        });
                    }
                    for field in fields {
                        validate_identifier(field)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Result of applying a delta to one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// The delta was applied by this call.
    Applied,
    /// The partition already had this delta; nothing changed.
    AlreadyApplied,
}

/// A ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
    /// Version label.
    pub version: String,
    /// Fingerprint recorded at application time.
    pub fingerprint: String,
    /// When the delta was applied.
    pub applied_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_deposit() -> SchemaDelta {
        SchemaDelta::new("0002_lease_deposit")
            .requires("0001_baseline")
            .change(SchemaChange::AddField {
                entity: "lease".to_string(),
                field: FieldDef::real("security_deposit"),
            })
    }

    #[test]
    fn test_fingerprint_tracks_changes() {
        let a = add_deposit();
        let mut b = add_deposit();
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.changes.push(SchemaChange::CreateIndex {
            entity: "lease".to_string(),
            name: "lease_by_unit".to_string(),
            fields: vec!["unit_id".to_string()],
            unique: false,
        });
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_ignores_requires() {
        let mut a = add_deposit();
        let b = add_deposit();
        a.requires = None;
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_validate() {
        assert!(add_deposit().validate().is_ok());
        assert!(SchemaDelta::new("0003").validate().is_err());
        assert!(
            SchemaDelta::new("bad version")
                .change(SchemaChange::AddField {
                    entity: "lease".to_string(),
                    field: FieldDef::text("note"),
                })
                .validate()
                .is_err()
        );
        assert!(
            SchemaDelta::new("0004")
                .change(SchemaChange::CreateIndex {
                    entity: "lease".to_string(),
                    name: "empty".to_string(),
                    fields: vec![],
                    unique: false,
                })
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(add_deposit()).unwrap();
        assert_eq!(json["changes"][0]["op"], "add_field");
        assert_eq!(json["changes"][0]["field"]["field_type"], "real");

        let parsed: SchemaDelta = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, add_deposit());
    }
}
