//! Route configuration.
//!
//! Business routes sit behind the tenant routing middleware; admin and health
//! routes do not.

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};

use crate::handlers;
use crate::middleware::tenant_routing_middleware;
use crate::state::{AppState, AppStorage};

/// Creates all REST API routes.
///
/// # Routes
///
/// ## Host-routed
/// - `GET /api/_tenant` - The bound tenant and partition
/// - `GET /api/{module}/{entity}` - List
/// - `POST /api/{module}/{entity}` - Create
/// - `GET /api/{module}/{entity}/{id}` - Read
///
/// ## Administration
/// - `POST /_admin/tenants` - Provision
/// - `GET /_admin/tenants` - List tenants
/// - `GET /_admin/tenants/{tenant_id}` - Tenant detail
/// - `POST /_admin/tenants/{tenant_id}/domains` - Register a domain
/// - `POST /_admin/tenants/{tenant_id}/deprovision` - Deprovision
/// - `POST /_admin/tenants/{tenant_id}/migrations` - Migrate one partition
/// - `DELETE /_admin/domains/{domain}` - Deregister a domain
/// - `POST /_admin/migrations` - Migrate every ready partition
///
/// ## Probes
/// - `GET /health`, `GET /_liveness`, `GET /_readiness`
pub fn create_routes<S: AppStorage>(state: AppState<S>) -> Router {
    let tenant_routes = Router::new()
        .route("/api/_tenant", get(handlers::current_tenant_handler))
        .route(
            "/api/{module}/{entity}",
            get(handlers::list_entities_handler::<S>).post(handlers::create_entity_handler::<S>),
        )
        .route(
            "/api/{module}/{entity}/{id}",
            get(handlers::read_entity_handler::<S>),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            tenant_routing_middleware::<S>,
        ));

    let admin_routes = Router::new()
        .route(
            "/tenants",
            post(handlers::provision_handler::<S>).get(handlers::list_tenants_handler::<S>),
        )
        .route("/tenants/{tenant_id}", get(handlers::get_tenant_handler::<S>))
        .route(
            "/tenants/{tenant_id}/domains",
            post(handlers::add_domain_handler::<S>),
        )
        .route(
            "/tenants/{tenant_id}/deprovision",
            post(handlers::deprovision_handler::<S>),
        )
        .route(
            "/tenants/{tenant_id}/migrations",
            post(handlers::migrate_tenant_handler::<S>),
        )
        .route("/domains/{domain}", delete(handlers::remove_domain_handler::<S>))
        .route("/migrations", post(handlers::migrate_all_handler::<S>));

    Router::new()
        .route("/health", get(handlers::health_handler::<S>))
        .route("/_liveness", get(handlers::liveness_handler))
        .route("/_readiness", get(handlers::readiness_handler::<S>))
        .merge(tenant_routes)
        .nest("/_admin", admin_routes)
        .with_state(state)
}
