//! Entity definitions and classification.
//!
//! Every business entity is declared once, with its partition class attached
//! at declaration time. The provisioner reads these declarations to decide what
//! to create in each partition and in which order.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CatalogError, ValidationError};

/// Columns every entity table carries; field definitions may not reuse them.
pub const RESERVED_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

/// Entity names reserved for bookkeeping and registry tables.
pub const RESERVED_ENTITIES: &[&str] = &[
    "schema_migrations",
    "registry_tenants",
    "registry_partitions",
    "registry_domains",
    "registry_version",
];

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,47}$").expect("static identifier pattern"));

/// Checks that a name can be used as an entity, field or index name.
pub(crate) fn validate_identifier(name: &str) -> Result<(), CatalogError> {
    if !IDENTIFIER.is_match(name) {
        return Err(CatalogError::InvalidName {
            name: name.to_string(),
            message: "must match ^[a-z][a-z0-9_]*$ and be at most 48 characters".to_string(),
        });
    }
    if name.contains("__") {
        return Err(CatalogError::InvalidName {
            name: name.to_string(),
            message: "cannot contain '__'".to_string(),
        });
    }
    Ok(())
}

/// Where an entity type lives.
///
/// An entity type belongs to exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartitionClass {
    /// One independent copy per tenant partition.
    ///
    /// This is the default: business data is tenant-owned unless declared
    /// otherwise.
    #[default]
    Isolated,

    /// A single global instance in the shared partition.
    Shared,
}

/// Logical type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// Floating point number.
    Real,
    /// `true` / `false`.
    Boolean,
    /// RFC 3339 timestamp or `YYYY-MM-DD` date.
    Timestamp,
    /// Arbitrary JSON.
    Json,
    /// ID of another entity.
    Reference(String),
}

impl FieldType {
    fn describe(&self) -> &'static str {
        match self {
            FieldType::Text => "a string",
            FieldType::Integer => "an integer",
            FieldType::Real => "a number",
            FieldType::Boolean => "a boolean",
            FieldType::Timestamp => "an RFC 3339 timestamp or YYYY-MM-DD date",
            FieldType::Json => "JSON",
            FieldType::Reference(_) => "an entity id",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Text => value.is_string(),
            FieldType::Integer => value.is_i64(),
            FieldType::Real => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Timestamp => value.as_str().is_some_and(|s| {
                DateTime::parse_from_rfc3339(s).is_ok()
                    || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            }),
            FieldType::Json => true,
            FieldType::Reference(_) => value.as_str().is_some_and(|s| !s.is_empty()),
        }
    }
}

/// A field of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field (column) name.
    pub name: String,
    /// Logical type.
    pub field_type: FieldType,
    /// Whether a non-null value is mandatory on create.
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    /// Creates an optional field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Real)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Timestamp)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Json)
    }

    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldType::Reference(target.into()))
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Returns the referenced entity, if this is a reference field.
    pub fn reference_target(&self) -> Option<&str> {
        match &self.field_type {
            FieldType::Reference(target) => Some(target),
            _ => None,
        }
    }
}

/// A business entity declaration.
///
/// # Examples
///
/// ```
/// use realty_persistence::catalog::{EntityDefinition, FieldDef, PartitionClass};
///
/// let lease = EntityDefinition::isolated("leasing", "lease")
///     .field(FieldDef::reference("unit_id", "unit").required())
///     .field(FieldDef::real("monthly_rent").required());
///
/// assert_eq!(lease.class, PartitionClass::Isolated);
/// assert_eq!(lease.references().collect::<Vec<_>>(), vec![("unit_id", "unit")]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Business module the entity belongs to; used as the HTTP path prefix.
    pub module: String,
    /// Entity name, unique across the catalog.
    pub name: String,
    /// Partition class.
    #[serde(default)]
    pub class: PartitionClass,
    /// Declared fields, excluding the implicit `id`, `created_at` and `updated_at`.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl EntityDefinition {
    /// Declares an entity with an explicit class.
    pub fn new(module: impl Into<String>, name: impl Into<String>, class: PartitionClass) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            class,
            fields: Vec::new(),
        }
    }

    /// Declares a per-tenant entity.
    pub fn isolated(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(module, name, PartitionClass::Isolated)
    }

    /// Declares a platform-wide entity.
    pub fn shared(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(module, name, PartitionClass::Shared)
    }

    /// Adds a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Looks up a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `(field, target entity)` pairs for every reference field.
    pub fn references(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter_map(|f| f.reference_target().map(|t| (f.name.as_str(), t)))
    }

    /// Checks names and field uniqueness.
    pub fn validate(&self) -> Result<(), CatalogError> {
        validate_identifier(&self.module)?;
        validate_identifier(&self.name)?;
        if RESERVED_ENTITIES.contains(&self.name.as_str()) {
            return Err(CatalogError::InvalidName {
                name: self.name.clone(),
                message: "reserved entity name".to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            validate_identifier(&field.name)?;
            if RESERVED_FIELDS.contains(&field.name.as_str()) {
                return Err(CatalogError::InvalidName {
                    name: field.name.clone(),
                    message: format!("reserved field name on '{}'", self.name),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CatalogError::InvalidName {
                    name: field.name.clone(),
                    message: format!("declared twice on '{}'", self.name),
                });
            }
        }
        Ok(())
    }

    /// Validates a JSON record against this definition.
    ///
    /// Returns the declared field values, in declaration order, with missing
    /// optional fields set to `null`. The implicit `id` is accepted but not
    /// returned; `created_at` and `updated_at` are ignored.
    pub fn validate_record(&self, record: &Value) -> Result<Vec<(String, Value)>, ValidationError> {
        let invalid = |message: String| ValidationError::InvalidRecord {
            entity: self.name.clone(),
            message,
        };

        let object: &Map<String, Value> = record
            .as_object()
            .ok_or_else(|| invalid("record must be a JSON object".to_string()))?;

        for key in object.keys() {
            if !RESERVED_FIELDS.contains(&key.as_str()) && self.get_field(key).is_none() {
                return Err(invalid(format!("unknown field '{}'", key)));
            }
        }

        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = object.get(&field.name).cloned().unwrap_or(Value::Null);
            if value.is_null() {
                if field.required {
                    return Err(ValidationError::MissingRequiredField {
                        field: format!("{}.{}", self.name, field.name),
                    });
                }
            } else if !field.field_type.accepts(&value) {
                return Err(invalid(format!(
                    "field '{}' must be {}",
                    field.name,
                    field.field_type.describe()
                )));
            }
            values.push((field.name.clone(), value));
        }
        Ok(values)
    }
}
