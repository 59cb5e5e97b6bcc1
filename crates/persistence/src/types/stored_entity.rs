//! Stored entity type.
//!
//! A [`StoredEntity`] is an entity instance as read back from a partition,
//! carrying the partition it was read from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tenant::PartitionId;

/// An entity instance with persistence metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntity {
    /// Entity name.
    pub entity: String,
    /// Instance ID, unique within the entity table of one partition.
    pub id: String,
    /// Partition the row lives in.
    pub partition_id: PartitionId,
    /// Declared field values.
    pub fields: Map<String, Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl StoredEntity {
    /// Returns the JSON representation served over HTTP.
    ///
    /// The partition is deliberately left out; clients never see physical names.
    pub fn to_json(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 3);
        object.insert("id".to_string(), Value::String(self.id.clone()));
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.clone());
        }
        object.insert(
            "created_at".to_string(),
            Value::String(self.created_at.to_rfc3339()),
        );
        object.insert(
            "updated_at".to_string(),
            Value::String(self.updated_at.to_rfc3339()),
        );
        Value::Object(object)
    }
}
