//! Schema-per-tenant partition naming.
//!
//! In this strategy, each tenant has a separate schema holding one copy of
//! every isolated entity table, and one shared schema holds the registry and
//! the shared entities. This module owns every rule for turning tenants and
//! entities into physical names.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::tenant::{MAX_PARTITION_ID_LEN, PartitionId, TenantId};

/// Separator between partition and entity in physical table names.
pub const TABLE_SEPARATOR: &str = "__";

/// Configuration for schema-per-tenant naming.
///
/// # Example
///
/// ```
/// use realty_persistence::strategy::SchemaPerTenantConfig;
///
/// let config = SchemaPerTenantConfig {
///     schema_prefix: "org_".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.shared_schema, "shared");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaPerTenantConfig {
    /// Prefix for tenant schema names.
    ///
    /// The full schema name is `{prefix}{tenant_id}` with `-` replaced by `_`.
    #[serde(default = "default_schema_prefix")]
    pub schema_prefix: String,

    /// Name of the shared schema holding the registry and shared entities.
    #[serde(default = "default_shared_schema")]
    pub shared_schema: String,

    /// Maximum schema name length (PostgreSQL limit is 63).
    #[serde(default = "default_max_schema_length")]
    pub max_schema_length: usize,
}

fn default_schema_prefix() -> String {
    "tenant_".to_string()
}

fn default_shared_schema() -> String {
    "shared".to_string()
}

fn default_max_schema_length() -> usize {
    MAX_PARTITION_ID_LEN
}

impl Default for SchemaPerTenantConfig {
    fn default() -> Self {
        Self {
            schema_prefix: default_schema_prefix(),
            shared_schema: default_shared_schema(),
            max_schema_length: default_max_schema_length(),
        }
    }
}

impl SchemaPerTenantConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schema prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.schema_prefix = prefix.into();
        self
    }

    /// Sets the shared schema name.
    pub fn with_shared_schema(mut self, schema: impl Into<String>) -> Self {
        self.shared_schema = schema.into();
        self
    }
}

/// Schema-per-tenant naming strategy.
///
/// # Schema Naming
///
/// Tenant IDs are converted to schema names:
/// - Prefixed with the configured prefix (default: `tenant_`)
/// - `-` replaced with `_`
/// - Truncated to the maximum length
/// - Suffixed with `_2`, `_3`, ... when the name is taken by another tenant
///
/// # Physical Tables
///
/// Backends without native schemas store entity `lease` of partition
/// `tenant_acme` in the table `tenant_acme__lease`. Partition identifiers
/// never contain `__`, so the mapping is unambiguous.
#[derive(Debug, Clone)]
pub struct SchemaPerTenantStrategy {
    config: SchemaPerTenantConfig,
    shared: PartitionId,
}

impl SchemaPerTenantStrategy {
    /// Creates a new strategy with the given configuration.
    ///
    /// # Errors
    ///
    /// Fails if the shared schema is not a valid identifier, if the prefix
    /// cannot start a valid identifier, if the shared schema could collide
    /// with a tenant schema, or if the length limit leaves no room for a
    /// tenant name.
    pub fn new(config: SchemaPerTenantConfig) -> Result<Self, ValidationError> {
        let invalid = |value: &str, message: String| ValidationError::InvalidPartitionId {
            value: value.to_string(),
            message,
        };

        if config.max_schema_length == 0 || config.max_schema_length > MAX_PARTITION_ID_LEN {
            return Err(invalid(
                &config.max_schema_length.to_string(),
                format!("max schema length must be between 1 and {}", MAX_PARTITION_ID_LEN),
            ));
        }

        let shared = PartitionId::parse(config.shared_schema.clone())?;
        if shared.as_str().len() > config.max_schema_length {
            return Err(invalid(
                shared.as_str(),
                "shared schema exceeds max schema length".to_string(),
            ));
        }

        // The prefix must be a valid identifier on its own once a letter is appended.
        PartitionId::parse(format!("{}a", config.schema_prefix))?;
        if config.schema_prefix.len() + 1 > config.max_schema_length {
            return Err(invalid(
                &config.schema_prefix,
                "prefix leaves no room for the tenant name".to_string(),
            ));
        }
        if shared.as_str().starts_with(&config.schema_prefix) {
            return Err(invalid(
                shared.as_str(),
                format!("shared schema must not start with the tenant prefix '{}'", config.schema_prefix),
            ));
        }

        Ok(Self { config, shared })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SchemaPerTenantConfig {
        &self.config
    }

    /// Returns the shared partition.
    pub fn shared_partition(&self) -> &PartitionId {
        &self.shared
    }

    /// Returns `true` if the identifier has the shape of a tenant partition.
    pub fn is_tenant_partition(&self, partition: &PartitionId) -> bool {
        partition != &self.shared && partition.as_str().starts_with(&self.config.schema_prefix)
    }

    /// Returns the preferred schema name for a tenant.
    pub fn base_schema_name(&self, tenant_id: &TenantId) -> String {
        let mut name = format!(
            "{}{}",
            self.config.schema_prefix,
            tenant_id.as_str().replace('-', "_")
        );
        name.truncate(self.config.max_schema_length);
        while name.ends_with('_') {
            name.pop();
        }
        name
    }

    /// Returns the `attempt`-th candidate partition identifier for a tenant.
    ///
    /// Attempt 1 is the base name; attempt `n > 1` appends `_n`, shortening
    /// the base as needed to stay within the length limit. Candidates are a
    /// pure function of the tenant ID, so retries walk the same sequence.
    pub fn candidate(&self, tenant_id: &TenantId, attempt: u32) -> Result<PartitionId, ValidationError> {
        let base = self.base_schema_name(tenant_id);
        if attempt <= 1 {
            return PartitionId::parse(base);
        }

        let suffix = format!("_{}", attempt);
        let mut stem = base;
        stem.truncate(self.config.max_schema_length.saturating_sub(suffix.len()));
        while stem.ends_with('_') {
            stem.pop();
        }
        PartitionId::parse(format!("{}{}", stem, suffix))
    }

    /// Returns the physical table name of an entity within a partition.
    pub fn table_name(&self, partition: &PartitionId, entity: &str) -> String {
        physical_table(partition, entity)
    }
}

/// Returns the physical table name of an entity within a partition.
pub fn physical_table(partition: &PartitionId, entity: &str) -> String {
    format!("{}{}{}", partition.as_str(), TABLE_SEPARATOR, entity)
}

/// Escapes a SQL identifier (schema name, table name, etc.).
pub fn escape_identifier(id: &str) -> String {
    format!("\"{}\"", id.replace('"', "\"\""))
}
