//! Tenant administration handlers.
//!
//! Served under `/_admin` without host routing. These endpoints provision
//! tenants, manage their domains and roll schema deltas out to partitions.
//!
//! # Endpoints
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/_admin/tenants` | [`provision_handler`] |
//! | GET | `/_admin/tenants` | [`list_tenants_handler`] |
//! | GET | `/_admin/tenants/{tenant_id}` | [`get_tenant_handler`] |
//! | POST | `/_admin/tenants/{tenant_id}/domains` | [`add_domain_handler`] |
//! | POST | `/_admin/tenants/{tenant_id}/deprovision` | [`deprovision_handler`] |
//! | POST | `/_admin/tenants/{tenant_id}/migrations` | [`migrate_tenant_handler`] |
//! | DELETE | `/_admin/domains/{domain}` | [`remove_domain_handler`] |
//! | POST | `/_admin/migrations` | [`migrate_all_handler`] |

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use realty_persistence::catalog::SchemaDelta;
use realty_persistence::error::TenantError;
use realty_persistence::tenant::{PartitionRef, RoutingKey, TenantDescriptor, TenantId};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{RestError, RestResult};
use crate::state::{AppState, AppStorage};

/// Body of `POST /_admin/tenants/{tenant_id}/domains`.
#[derive(Debug, Deserialize)]
pub struct AddDomainRequest {
    /// Host name to route to the tenant.
    pub domain: String,
    /// Whether the domain becomes the tenant's primary domain.
    #[serde(default)]
    pub primary: bool,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> RestResult<T> {
    body.map(|Json(value)| value)
        .map_err(|e| RestError::BadRequest {
            message: e.body_text(),
        })
}

fn parse_tenant_id(raw: &str) -> RestResult<TenantId> {
    raw.parse::<TenantId>().map_err(|e| RestError::BadRequest {
        message: e.to_string(),
    })
}

fn partition_json(partition: &PartitionRef) -> Value {
    serde_json::json!({
        "tenant_id": partition.tenant_id,
        "partition_id": partition.partition_id,
        "status": partition.status,
    })
}

/// Provisions a tenant and registers its initial domain.
///
/// # Response
///
/// - `201 Created` - `{tenant_id, partition_id, status}`
/// - `400 Bad Request` - Malformed body or domain
/// - `422 Unprocessable Entity` - Missing name or invalid contact email
/// - `409 Conflict` - The domain belongs to another tenant, or the name
///   maps to another organization's identifier. If the domain was claimed
///   while the partition was being built, the body carries
///   `{status: "ready", tenant_id, partition_id}`
/// - `500 Internal Server Error` - Provisioning failed or timed out; the
///   partition is left `failed` and never routable
pub async fn provision_handler<S: AppStorage>(
    State(state): State<AppState<S>>,
    body: Result<Json<TenantDescriptor>, JsonRejection>,
) -> RestResult<Response> {
    let descriptor = json_body(body)?;
    debug!(name = %descriptor.name, domain = %descriptor.domain, "Processing provision request");

    let partition = state.provisioner().provision(&descriptor).await?;
    info!(
        tenant_id = %partition.tenant_id,
        partition = %partition.partition_id,
        "Tenant provisioned"
    );

    Ok((StatusCode::CREATED, Json(partition_json(&partition))).into_response())
}

/// Lists every tenant.
pub async fn list_tenants_handler<S: AppStorage>(
    State(state): State<AppState<S>>,
) -> RestResult<Json<Value>> {
    let tenants = state.storage().list_tenants().await?;
    Ok(Json(serde_json::json!({
        "total": tenants.len(),
        "tenants": tenants,
    })))
}

/// Returns a tenant with its partition state and domains.
pub async fn get_tenant_handler<S: AppStorage>(
    State(state): State<AppState<S>>,
    Path(tenant_id): Path<String>,
) -> RestResult<Json<Value>> {
    let tenant_id = parse_tenant_id(&tenant_id)?;
    let storage = state.storage();

    let tenant = storage
        .tenant(&tenant_id)
        .await?
        .ok_or_else(|| TenantError::TenantNotFound {
            tenant_id: tenant_id.clone(),
        })?;
    let partition = storage
        .partition(&tenant.partition_id)
        .await?
        .ok_or_else(|| TenantError::PartitionNotFound {
            partition_id: tenant.partition_id.clone(),
        })?;
    let domains = storage.domains(&tenant_id).await?;
    let migrations = storage.applied_migrations(&partition.partition_id).await?;

    Ok(Json(serde_json::json!({
        "tenant": tenant,
        "partition": partition,
        "domains": domains,
        "migrations": migrations,
    })))
}

/// Routes an additional domain to a tenant.
///
/// # Response
///
/// - `201 Created` - The routing entry
/// - `409 Conflict` - The domain is taken, or the tenant is inactive
pub async fn add_domain_handler<S: AppStorage>(
    State(state): State<AppState<S>>,
    Path(tenant_id): Path<String>,
    body: Result<Json<AddDomainRequest>, JsonRejection>,
) -> RestResult<Response> {
    let tenant_id = parse_tenant_id(&tenant_id)?;
    let request = json_body(body)?;
    let key = RoutingKey::parse(&request.domain)?;

    let domain = state
        .storage()
        .register(&tenant_id, &key, request.primary)
        .await?;
    info!(tenant_id = %tenant_id, domain = %key, "Domain registered");

    Ok((StatusCode::CREATED, Json(domain)).into_response())
}

/// Removes a routing entry. The tenant's partition is untouched.
pub async fn remove_domain_handler<S: AppStorage>(
    State(state): State<AppState<S>>,
    Path(domain): Path<String>,
) -> RestResult<Json<Value>> {
    let key = RoutingKey::parse(&domain)?;
    let removed = state.storage().deregister(&key).await?;
    info!(tenant_id = %removed.tenant_id, domain = %key, "Domain deregistered");

    Ok(Json(serde_json::json!({ "removed": removed })))
}

/// Deactivates a tenant. Its domains stop routing; its data is retained.
pub async fn deprovision_handler<S: AppStorage>(
    State(state): State<AppState<S>>,
    Path(tenant_id): Path<String>,
) -> RestResult<Json<Value>> {
    let tenant_id = parse_tenant_id(&tenant_id)?;
    let provisioner = state.provisioner();

    let partition = provisioner.partition_ref(&tenant_id).await?;
    let partition = provisioner.deprovision(&partition).await?;
    info!(tenant_id = %tenant_id, partition = %partition.partition_id, "Tenant deprovisioned");

    Ok(Json(partition_json(&partition)))
}

/// Applies a schema delta to one tenant's partition.
///
/// # Response
///
/// - `200 OK` - `{partition_id, version, outcome}` where outcome is
///   `applied` or `already_applied`
/// - `409 Conflict` - Checksum mismatch, or a prerequisite is missing
pub async fn migrate_tenant_handler<S: AppStorage>(
    State(state): State<AppState<S>>,
    Path(tenant_id): Path<String>,
    body: Result<Json<SchemaDelta>, JsonRejection>,
) -> RestResult<Json<Value>> {
    let tenant_id = parse_tenant_id(&tenant_id)?;
    let delta = json_body(body)?;
    let provisioner = state.provisioner();

    let partition = provisioner.partition_ref(&tenant_id).await?;
    let outcome = provisioner.migrate(&partition, &delta).await?;

    Ok(Json(serde_json::json!({
        "partition_id": partition.partition_id,
        "version": delta.version,
        "outcome": outcome,
    })))
}

/// Fans a schema delta out to every ready partition.
///
/// Responds `200 OK` with the per-partition report when every partition
/// succeeded, `207 Multi-Status` when some failed or were still being
/// provisioned (listed under `pending`).
pub async fn migrate_all_handler<S: AppStorage>(
    State(state): State<AppState<S>>,
    body: Result<Json<SchemaDelta>, JsonRejection>,
) -> RestResult<Response> {
    let delta = json_body(body)?;
    let report = state.provisioner().migrate_all(&delta).await?;

    let status = if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(report)).into_response())
}
