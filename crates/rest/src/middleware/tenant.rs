//! Tenant routing middleware.
//!
//! Resolves the request host to a tenant partition and attaches the resulting
//! [`BoundContext`](realty_persistence::tenant::BoundContext) to the request
//! extensions. Handlers read it back with the
//! [`Bound`](crate::extractors::Bound) extractor.
//!
//! The context lives only in the request it was created for, so concurrently
//! handled requests never share a "current tenant".

use axum::{
    extract::{Request, State},
    http::header::HeaderName,
    middleware::Next,
    response::{IntoResponse, Response},
};
use realty_persistence::error::{StorageError, TenantError};
use tracing::{debug, warn};

use crate::error::RestError;
use crate::state::{AppState, AppStorage};

/// Header carrying the request correlation ID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Binds the request to its tenant partition.
///
/// Unknown, inactive or not-yet-ready hosts get a 404 before any handler
/// runs. Use with `axum::middleware::from_fn_with_state`.
pub async fn tenant_routing_middleware<S: AppStorage>(
    State(state): State<AppState<S>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let correlation_id = parts
        .headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    match state.router().route(&parts, correlation_id).await {
        Ok(ctx) => {
            debug!(
                tenant_id = %ctx.tenant_id(),
                partition = %ctx.current_partition(),
                "Bound request to tenant partition"
            );
            parts.extensions.insert(ctx);
            next.run(Request::from_parts(parts, body)).await
        }
        Err(StorageError::Tenant(TenantError::UnknownTenant { routing_key })) => {
            debug!(routing_key = %routing_key, path = %parts.uri.path(), "Unknown tenant host");
            RestError::UnknownTenant.into_response()
        }
        Err(e) => {
            warn!(error = %e, "Tenant routing failed");
            RestError::from(e).into_response()
        }
    }
}
