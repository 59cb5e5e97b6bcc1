//! Error types for the persistence layer.
//!
//! This module defines all error types used throughout the persistence layer,
//! following a hierarchy that separates routing errors, provisioning errors,
//! migration errors, isolation breaches, and backend failures.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::tenant::{PartitionId, PartitionStatus, TenantId};

/// The primary error type for all storage operations.
///
/// This enum encompasses all possible errors that can occur during persistence
/// operations, organized by category.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Tenant and routing errors
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Partition provisioning errors
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// Schema migration errors
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Tenant isolation breaches
    #[error(transparent)]
    Isolation(#[from] IsolationError),

    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Entity state errors
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Entity catalog errors
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StorageError {
    /// Returns `true` if this error signals a tenant isolation breach.
    ///
    /// Callers must never swallow these; they are routed to the operator
    /// alert channel.
    pub fn is_isolation_breach(&self) -> bool {
        matches!(self, StorageError::Isolation(_))
    }
}

/// Errors related to tenants, domains, and routing.
#[derive(Error, Debug)]
pub enum TenantError {
    /// No active, ready tenant is mapped to the routing key.
    #[error("unknown tenant for host '{routing_key}'")]
    UnknownTenant { routing_key: String },

    /// The tenant does not exist in the registry.
    #[error("tenant not found: {tenant_id}")]
    TenantNotFound { tenant_id: TenantId },

    /// The domain is already mapped to a different tenant.
    #[error("domain '{domain}' is already registered to tenant {existing_tenant}")]
    DuplicateDomain {
        domain: String,
        existing_tenant: TenantId,
    },

    /// The domain is not registered.
    #[error("domain not found: {domain}")]
    DomainNotFound { domain: String },

    /// A different organization already holds the canonical identifier.
    #[error("tenant name '{name}' conflicts with existing tenant {tenant_id}")]
    NameTaken { name: String, tenant_id: TenantId },

    /// The tenant has been deprovisioned.
    #[error("tenant inactive: {tenant_id}")]
    TenantInactive { tenant_id: TenantId },

    /// The partition does not exist in the registry.
    #[error("partition not found: {partition_id}")]
    PartitionNotFound { partition_id: PartitionId },
}

/// Errors raised while provisioning a partition.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    /// Schema application failed; the partition is marked failed.
    #[error("provisioning of partition {partition_id} for tenant {tenant_id} failed: {message}")]
    Failed {
        tenant_id: TenantId,
        partition_id: PartitionId,
        message: String,
    },

    /// The provisioning time budget elapsed; the partition is marked failed.
    #[error("provisioning of partition {partition_id} for tenant {tenant_id} timed out after {budget_ms}ms")]
    TimedOut {
        tenant_id: TenantId,
        partition_id: PartitionId,
        budget_ms: u64,
    },

    /// Every collision-suffixed candidate identifier is already taken.
    #[error("no free partition identifier derived from '{base}'")]
    PartitionIdExhausted { base: String },

    /// A concurrent allocation claimed the partition identifier first.
    #[error("partition identifier already taken: {partition_id}")]
    PartitionTaken { partition_id: PartitionId },

    /// Another process is provisioning the same tenant.
    #[error("provisioning of tenant {tenant_id} is already in progress")]
    InProgress { tenant_id: TenantId },

    /// The partition was built, but its initial domain was claimed by
    /// another tenant in the meantime. The tenant is `ready` without a
    /// routing entry.
    #[error(
        "tenant {tenant_id} was provisioned in partition {partition_id}, but domain '{domain}' was registered to tenant {existing_tenant} meanwhile; register another domain"
    )]
    DomainUnassigned {
        tenant_id: TenantId,
        partition_id: PartitionId,
        domain: String,
        existing_tenant: TenantId,
    },

    /// The partition is in a state that does not allow the requested transition.
    #[error("partition {partition_id} is {status}")]
    InvalidState {
        partition_id: PartitionId,
        status: PartitionStatus,
    },
}

/// Errors raised while applying schema deltas.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// The delta version was applied earlier with different changes.
    #[error("migration {version} was already applied to {partition_id} with different changes")]
    ChecksumMismatch {
        partition_id: PartitionId,
        version: String,
    },

    /// The delta depends on a version the partition has not applied.
    #[error("migration {version} requires {requires}, which is not applied to {partition_id}")]
    OutOfOrder {
        partition_id: PartitionId,
        version: String,
        requires: String,
    },

    /// The partition cannot be migrated in its current state.
    #[error("partition {partition_id} cannot be migrated while {status}")]
    PartitionNotMigratable {
        partition_id: PartitionId,
        status: PartitionStatus,
    },

    /// A change references an entity the partition does not have.
    #[error("migration {version} references unknown entity '{entity}'")]
    UnknownEntity { version: String, entity: String },
}

/// Tenant isolation breaches.
///
/// Observing one of these means a request context reached for data outside
/// its bound partition.
#[derive(Error, Debug)]
pub enum IsolationError {
    /// A context bound to one partition attempted to touch another.
    #[error("cross-partition access: context bound to {bound} requested {requested}")]
    CrossPartitionAccess {
        bound: PartitionId,
        requested: PartitionId,
    },
}

/// Validation errors for identifiers and records.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The routing key is not a valid host name.
    #[error("invalid routing key '{value}': {message}")]
    InvalidRoutingKey { value: String, message: String },

    /// The tenant name cannot be turned into an identifier.
    #[error("invalid tenant name '{name}': {message}")]
    InvalidTenantName { name: String, message: String },

    /// The partition identifier is not a valid schema name.
    #[error("invalid partition identifier '{value}': {message}")]
    InvalidPartitionId { value: String, message: String },

    /// A required descriptor field is missing or empty.
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },

    /// A record does not match its entity definition.
    #[error("invalid {entity} record: {message}")]
    InvalidRecord { entity: String, message: String },
}

/// Errors related to entity instances.
#[derive(Error, Debug)]
pub enum EntityError {
    /// The requested entity instance was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// An entity instance with the given ID already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: String, id: String },

    /// A reference field points to a missing row in the bound partition.
    #[error("{entity}.{field} references missing {target} {id}")]
    ReferenceNotFound {
        entity: String,
        field: String,
        target: String,
        id: String,
    },
}

/// Errors raised while building the entity catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// No entity with this name is registered.
    #[error("unknown entity: {module}/{entity}")]
    UnknownEntity { module: String, entity: String },

    /// The entity name was registered twice.
    #[error("entity '{entity}' is registered more than once")]
    DuplicateEntity { entity: String },

    /// A reference field names an entity that is not registered.
    #[error("entity '{entity}' references unknown entity '{target}'")]
    UnknownReference { entity: String, target: String },

    /// A shared entity references an isolated one.
    #[error("shared entity '{entity}' cannot reference isolated entity '{target}'")]
    SharedReferencesIsolated { entity: String, target: String },

    /// The reference graph contains a cycle.
    #[error("entity references form a cycle through: {}", entities.join(", "))]
    DependencyCycle { entities: Vec<String> },

    /// An entity or field name is not a valid identifier.
    #[error("invalid name '{name}': {message}")]
    InvalidName { name: String, message: String },

    /// Two schema deltas share a version.
    #[error("migration version '{version}' is registered more than once")]
    DuplicateMigration { version: String },
}

/// Backend-specific errors.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tenant_display() {
        let err = StorageError::Tenant(TenantError::UnknownTenant {
            routing_key: "other.example.com".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "unknown tenant for host 'other.example.com'"
        );
    }

    #[test]
    fn test_duplicate_domain_display() {
        let err = TenantError::DuplicateDomain {
            domain: "acme.example.com".to_string(),
            existing_tenant: TenantId::new("acme"),
        };
        assert!(err.to_string().contains("already registered to tenant acme"));
    }

    #[test]
    fn test_isolation_breach_detection() {
        let err = StorageError::Isolation(IsolationError::CrossPartitionAccess {
            bound: PartitionId::new_unchecked("tenant_acme"),
            requested: PartitionId::new_unchecked("tenant_globex"),
        });
        assert!(err.is_isolation_breach());
        assert!(err.to_string().contains("tenant_globex"));

        let err = StorageError::Tenant(TenantError::TenantNotFound {
            tenant_id: TenantId::new("acme"),
        });
        assert!(!err.is_isolation_breach());
    }

    #[test]
    fn test_dependency_cycle_display() {
        let err = CatalogError::DependencyCycle {
            entities: vec!["lease".to_string(), "unit".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "entity references form a cycle through: lease, unit"
        );
    }

    #[test]
    fn test_migration_error_display() {
        let err = MigrationError::OutOfOrder {
            partition_id: PartitionId::new_unchecked("tenant_acme"),
            version: "0002".to_string(),
            requires: "0001".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "migration 0002 requires 0001, which is not applied to tenant_acme"
        );
    }
}
