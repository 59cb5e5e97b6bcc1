//! Health check endpoint handlers.
//!
//! These endpoints are served without tenant routing so load balancers can
//! probe any host name.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::state::{AppState, AppStorage};

/// Handler for the health check endpoint.
///
/// # HTTP Request
///
/// `GET [base]/health`
///
/// # Response
///
/// - `200 OK` - Server is healthy
pub async fn health_handler<S: AppStorage>(State(state): State<AppState<S>>) -> RestResult<Response> {
    debug!("Processing health check request");

    let health_response = serde_json::json!({
        "status": "healthy",
        "backend": state.storage().name(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    Ok((StatusCode::OK, Json(health_response)).into_response())
}

/// Handler for a liveness probe.
///
/// # HTTP Request
///
/// `GET [base]/_liveness`
pub async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Handler for a readiness probe.
///
/// Checks that the backend answers a query.
///
/// # HTTP Request
///
/// `GET [base]/_readiness`
///
/// # Response
///
/// - `200 OK` - Backend reachable
/// - `503 Service Unavailable` - Backend check failed
pub async fn readiness_handler<S: AppStorage>(
    State(state): State<AppState<S>>,
) -> RestResult<Response> {
    debug!("Processing readiness check request");

    state.storage().health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness check failed");
        RestError::ServiceUnavailable {
            message: e.to_string(),
        }
    })?;

    let response = serde_json::json!({
        "status": "ready",
        "backend": state.storage().name(),
        "checks": {
            "storage": "ok"
        }
    });

    Ok((StatusCode::OK, Json(response)).into_response())
}
