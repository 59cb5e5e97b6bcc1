//! Host-routed business entity handlers.
//!
//! Every handler here takes a [`Bound`] context, so it can only run for a
//! request that was routed to a ready tenant partition. Handlers name an
//! entity; the partition follows from the entity's class and the binding.
//!
//! # Endpoints
//!
//! - `GET  /api/_tenant`
//! - `GET  /api/{module}/{entity}`
//! - `POST /api/{module}/{entity}`
//! - `GET  /api/{module}/{entity}/{id}`

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::extractors::{Bound, PageQuery};
use crate::state::{AppState, AppStorage};

/// Returns the tenant and partition the request is bound to.
///
/// # HTTP Request
///
/// `GET /api/_tenant`
pub async fn current_tenant_handler(Bound(ctx): Bound) -> Json<Value> {
    Json(serde_json::json!({
        "tenant_id": ctx.tenant_id(),
        "partition_id": ctx.current_partition(),
        "shared_partition": ctx.shared_partition(),
    }))
}

/// Lists one page of an entity.
///
/// # HTTP Request
///
/// `GET /api/{module}/{entity}?count=&offset=`
///
/// # Response
///
/// - `200 OK` - `{items, total, count, offset, has_more}`
/// - `404 Not Found` - Unknown module or entity
pub async fn list_entities_handler<S: AppStorage>(
    State(state): State<AppState<S>>,
    Bound(ctx): Bound,
    Path((module, entity)): Path<(String, String)>,
    page: PageQuery,
) -> RestResult<Json<Value>> {
    debug!(
        tenant_id = %ctx.tenant_id(),
        module = %module,
        entity = %entity,
        count = page.count(),
        offset = page.offset(),
        "Processing list request"
    );

    let definition = state.catalog().lookup(&module, &entity)?;
    let result = state
        .storage()
        .list(&ctx, definition, page.pagination())
        .await?;

    let items: Vec<Value> = result.items.iter().map(|e| e.to_json()).collect();
    Ok(Json(serde_json::json!({
        "items": items,
        "total": result.total,
        "count": result.pagination.count,
        "offset": result.pagination.offset,
        "has_more": result.has_more(),
    })))
}

/// Creates an entity record in the partition its class maps to.
///
/// # HTTP Request
///
/// `POST /api/{module}/{entity}`
///
/// # Response
///
/// - `201 Created` - Record created; `Location` points at it
/// - `400 Bad Request` - Body is not JSON
/// - `409 Conflict` - A record with the same ID exists
/// - `422 Unprocessable Entity` - The record fails validation, or a
///   reference does not resolve
pub async fn create_entity_handler<S: AppStorage>(
    State(state): State<AppState<S>>,
    Bound(ctx): Bound,
    Path((module, entity)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> RestResult<Response> {
    let Json(record) = body.map_err(|e| RestError::BadRequest {
        message: e.body_text(),
    })?;

    debug!(
        tenant_id = %ctx.tenant_id(),
        module = %module,
        entity = %entity,
        "Processing create request"
    );

    let definition = state.catalog().lookup(&module, &entity)?;
    let created = state.storage().create(&ctx, definition, record).await?;

    let location = format!("/api/{}/{}/{}", module, entity, created.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(created.to_json()),
    )
        .into_response())
}

/// Reads one entity record.
///
/// # HTTP Request
///
/// `GET /api/{module}/{entity}/{id}`
///
/// # Response
///
/// - `200 OK` - The record
/// - `404 Not Found` - No such record in this tenant's partition
pub async fn read_entity_handler<S: AppStorage>(
    State(state): State<AppState<S>>,
    Bound(ctx): Bound,
    Path((module, entity, id)): Path<(String, String, String)>,
) -> RestResult<Json<Value>> {
    debug!(
        tenant_id = %ctx.tenant_id(),
        entity = %entity,
        id = %id,
        "Processing read request"
    );

    let definition = state.catalog().lookup(&module, &entity)?;
    let record = state
        .storage()
        .read(&ctx, definition, &id)
        .await?
        .ok_or_else(|| RestError::NotFound {
            kind: entity.clone(),
            id: id.clone(),
        })?;

    Ok(Json(record.to_json()))
}
