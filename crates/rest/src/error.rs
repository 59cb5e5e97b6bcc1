//! Error types for the realty REST API.
//!
//! Every error is returned as a JSON body `{"error": <code>, "message": <text>}`
//! with the matching HTTP status.
//!
//! # Error Mapping
//!
//! | Storage Error | HTTP Status | Code |
//! |--------------|-------------|------|
//! | UnknownTenant | 404 | unknown-tenant |
//! | TenantNotFound, DomainNotFound, entity NotFound | 404 | not-found |
//! | DuplicateDomain, NameTaken, AlreadyExists, InProgress | 409 | conflict |
//! | DomainUnassigned | 409 | conflict (with `status: ready`) |
//! | Migration conflicts | 409 | conflict |
//! | ValidationError | 400 / 422 | invalid / processing |
//! | ProvisioningError::Failed, TimedOut | 500 | provisioning-failed |
//! | CrossPartitionAccess | 500 | exception |
//! | BackendError | 500 | exception |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use realty_persistence::error::{
    BackendError, CatalogError, EntityError, IsolationError, MigrationError, ProvisioningError,
    StorageError, TenantError, ValidationError,
};
use realty_persistence::tenant::{PartitionId, TenantId};
use std::fmt;

/// The primary error type for REST API operations.
#[derive(Debug)]
pub enum RestError {
    /// The request host does not route to any tenant (HTTP 404).
    ///
    /// The response never says how close the host came to a real tenant.
    UnknownTenant,

    /// Record not found (HTTP 404).
    NotFound {
        /// The kind of record (an entity name, "tenant", "domain").
        kind: String,
        /// The record identifier.
        id: String,
    },

    /// Conflicting state (HTTP 409).
    Conflict {
        /// Message describing the conflict.
        message: String,
    },

    /// Bad request (HTTP 400).
    BadRequest {
        /// Error message.
        message: String,
    },

    /// Well-formed request that failed validation (HTTP 422).
    UnprocessableEntity {
        /// Error message.
        message: String,
    },

    /// Partition provisioning failed or timed out (HTTP 500).
    ProvisioningFailed {
        /// Tenant being provisioned.
        tenant_id: TenantId,
        /// Partition left in the `failed` state.
        partition_id: PartitionId,
        /// Operator-facing failure description.
        message: String,
    },

    /// The tenant was provisioned but its domain was taken meanwhile (HTTP 409).
    DomainUnassigned {
        /// Tenant that was provisioned.
        tenant_id: TenantId,
        /// Its `ready` partition.
        partition_id: PartitionId,
        /// Operator-facing description.
        message: String,
    },

    /// A bound context reached outside its partition (HTTP 500).
    IsolationBreach,

    /// The backend is not ready (HTTP 503).
    ServiceUnavailable {
        /// Error message.
        message: String,
    },

    /// Internal server error (HTTP 500).
    InternalError {
        /// Error message.
        message: String,
    },
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::UnknownTenant => write!(f, "Unknown tenant"),
            RestError::NotFound { kind, id } => write!(f, "Not found: {} {}", kind, id),
            RestError::Conflict { message } => write!(f, "Conflict: {}", message),
            RestError::BadRequest { message } => write!(f, "Bad request: {}", message),
            RestError::UnprocessableEntity { message } => {
                write!(f, "Unprocessable entity: {}", message)
            }
            RestError::ProvisioningFailed { message, .. } => {
                write!(f, "Provisioning failed: {}", message)
            }
            RestError::DomainUnassigned { message, .. } => write!(f, "Conflict: {}", message),
            RestError::IsolationBreach => write!(f, "Isolation breach"),
            RestError::ServiceUnavailable { message } => {
                write!(f, "Service unavailable: {}", message)
            }
            RestError::InternalError { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for RestError {}

impl RestError {
    /// Returns the HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            RestError::UnknownTenant | RestError::NotFound { .. } => StatusCode::NOT_FOUND,
            RestError::Conflict { .. } | RestError::DomainUnassigned { .. } => StatusCode::CONFLICT,
            RestError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            RestError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RestError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RestError::ProvisioningFailed { .. }
            | RestError::IsolationBreach
            | RestError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            RestError::UnknownTenant => error_body("unknown-tenant", "Not found"),
            RestError::NotFound { kind, id } => {
                error_body("not-found", &format!("{} '{}' not found", kind, id))
            }
            RestError::Conflict { message } => error_body("conflict", message),
            RestError::BadRequest { message } => error_body("invalid", message),
            RestError::UnprocessableEntity { message } => error_body("processing", message),
            RestError::ProvisioningFailed {
                tenant_id,
                partition_id,
                message,
            } => {
                let mut body = error_body("provisioning-failed", message);
                body["status"] = "failed".into();
                body["tenant_id"] = tenant_id.as_str().into();
                body["partition_id"] = partition_id.as_str().into();
                body
            }
            RestError::DomainUnassigned {
                tenant_id,
                partition_id,
                message,
            } => {
                let mut body = error_body("conflict", message);
                body["status"] = "ready".into();
                body["tenant_id"] = tenant_id.as_str().into();
                body["partition_id"] = partition_id.as_str().into();
                body
            }
            RestError::IsolationBreach => error_body("exception", "Internal server error"),
            RestError::ServiceUnavailable { message } => error_body("unavailable", message),
            RestError::InternalError { message } => {
                tracing::error!(error = %message, "Request failed");
                error_body("exception", "Internal server error")
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Builds the JSON error body.
fn error_body(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": code,
        "message": message,
    })
}

// Conversions from storage errors

impl From<StorageError> for RestError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Tenant(e) => e.into(),
            StorageError::Provisioning(e) => e.into(),
            StorageError::Migration(e) => e.into(),
            StorageError::Isolation(e) => e.into(),
            StorageError::Validation(e) => e.into(),
            StorageError::Entity(e) => e.into(),
            StorageError::Catalog(e) => e.into(),
            StorageError::Backend(e) => e.into(),
        }
    }
}

impl From<TenantError> for RestError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::UnknownTenant { .. } => RestError::UnknownTenant,
            TenantError::TenantNotFound { tenant_id } => RestError::NotFound {
                kind: "tenant".to_string(),
                id: tenant_id.to_string(),
            },
            TenantError::DomainNotFound { domain } => RestError::NotFound {
                kind: "domain".to_string(),
                id: domain,
            },
            TenantError::PartitionNotFound { partition_id } => RestError::NotFound {
                kind: "partition".to_string(),
                id: partition_id.to_string(),
            },
            TenantError::DuplicateDomain { .. }
            | TenantError::NameTaken { .. }
            | TenantError::TenantInactive { .. } => {
                RestError::Conflict {
                    message: err.to_string(),
                }
            }
        }
    }
}

impl From<ProvisioningError> for RestError {
    fn from(err: ProvisioningError) -> Self {
        let message = err.to_string();
        match err {
            ProvisioningError::Failed {
                tenant_id,
                partition_id,
                ..
            }
            | ProvisioningError::TimedOut {
                tenant_id,
                partition_id,
                ..
            } => RestError::ProvisioningFailed {
                tenant_id,
                partition_id,
                message,
            },
            ProvisioningError::PartitionIdExhausted { .. } => {
                RestError::UnprocessableEntity { message }
            }
            ProvisioningError::DomainUnassigned {
                tenant_id,
                partition_id,
                ..
            } => RestError::DomainUnassigned {
                tenant_id,
                partition_id,
                message,
            },
            ProvisioningError::PartitionTaken { .. }
            | ProvisioningError::InProgress { .. }
            | ProvisioningError::InvalidState { .. } => RestError::Conflict { message },
        }
    }
}

impl From<MigrationError> for RestError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::UnknownEntity { .. } => RestError::UnprocessableEntity {
                message: err.to_string(),
            },
            MigrationError::ChecksumMismatch { .. }
            | MigrationError::OutOfOrder { .. }
            | MigrationError::PartitionNotMigratable { .. } => RestError::Conflict {
                message: err.to_string(),
            },
        }
    }
}

impl From<IsolationError> for RestError {
    fn from(_err: IsolationError) -> Self {
        // Already reported on the breach target where it was detected.
        RestError::IsolationBreach
    }
}

impl From<ValidationError> for RestError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidRecord { .. } | ValidationError::MissingRequiredField { .. } => {
                RestError::UnprocessableEntity {
                    message: err.to_string(),
                }
            }
            ValidationError::InvalidRoutingKey { .. }
            | ValidationError::InvalidTenantName { .. }
            | ValidationError::InvalidPartitionId { .. } => RestError::BadRequest {
                message: err.to_string(),
            },
        }
    }
}

impl From<EntityError> for RestError {
    fn from(err: EntityError) -> Self {
        match err {
            EntityError::NotFound { entity, id } => RestError::NotFound { kind: entity, id },
            EntityError::AlreadyExists { .. } => RestError::Conflict {
                message: err.to_string(),
            },
            EntityError::ReferenceNotFound { .. } => RestError::UnprocessableEntity {
                message: err.to_string(),
            },
        }
    }
}

impl From<CatalogError> for RestError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownEntity { module, entity } => RestError::NotFound {
                kind: "entity".to_string(),
                id: format!("{}/{}", module, entity),
            },
            _ => RestError::BadRequest {
                message: err.to_string(),
            },
        }
    }
}

impl From<BackendError> for RestError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable { .. } | BackendError::PoolExhausted { .. } => {
                RestError::ServiceUnavailable {
                    message: err.to_string(),
                }
            }
            _ => RestError::InternalError {
                message: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::BadRequest {
            message: format!("Invalid JSON: {}", err),
        }
    }
}

/// Result type alias for REST operations.
pub type RestResult<T> = Result<T, RestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tenant_is_generic_404() {
        let err: RestError = StorageError::Tenant(TenantError::UnknownTenant {
            routing_key: "acme.example.co".to_string(),
        })
        .into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(!err.to_string().contains("acme"));
    }

    #[test]
    fn test_duplicate_domain_is_conflict() {
        let err: RestError = TenantError::DuplicateDomain {
            domain: "acme.example.com".to_string(),
            existing_tenant: TenantId::new("acme"),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("acme.example.com"));
    }

    #[test]
    fn test_provisioning_failure_mapping() {
        let err: RestError = ProvisioningError::TimedOut {
            tenant_id: TenantId::new("acme"),
            partition_id: PartitionId::new_unchecked("tenant_acme"),
            budget_ms: 100,
        }
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(err, RestError::ProvisioningFailed { .. }));

        let err: RestError = ProvisioningError::InProgress {
            tenant_id: TenantId::new("acme"),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_tenant_name_and_domain_races_are_conflicts() {
        let err: RestError = TenantError::NameTaken {
            name: "ACME  realty!".to_string(),
            tenant_id: TenantId::new("acme-realty"),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: RestError = ProvisioningError::DomainUnassigned {
            tenant_id: TenantId::new("acme"),
            partition_id: PartitionId::new_unchecked("tenant_acme"),
            domain: "acme.example.com".to_string(),
            existing_tenant: TenantId::new("globex"),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        match &err {
            RestError::DomainUnassigned {
                tenant_id,
                partition_id,
                message,
            } => {
                assert_eq!(tenant_id.as_str(), "acme");
                assert_eq!(partition_id.as_str(), "tenant_acme");
                assert!(message.contains("was provisioned"));
            }
            other => panic!("unexpected mapping: {:?}", other),
        }
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_isolation_breach_hides_details() {
        let err: RestError = StorageError::Isolation(IsolationError::CrossPartitionAccess {
            bound: PartitionId::new_unchecked("tenant_acme"),
            requested: PartitionId::new_unchecked("tenant_globex"),
        })
        .into();
        assert!(matches!(err, RestError::IsolationBreach));
        assert!(!err.to_string().contains("globex"));
    }

    #[test]
    fn test_validation_mapping() {
        let err: RestError = ValidationError::MissingRequiredField {
            field: "lease.unit_id".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: RestError = ValidationError::InvalidRoutingKey {
            value: "bad host".to_string(),
            message: "invalid".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_body() {
        let body = error_body("conflict", "taken");
        assert_eq!(body["error"], "conflict");
        assert_eq!(body["message"], "taken");
    }
}
