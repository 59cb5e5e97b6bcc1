//! Bound tenant context extractor.
//!
//! Reads the [`BoundContext`] that
//! [`tenant_routing_middleware`](crate::middleware::tenant_routing_middleware)
//! attached to the request.

use axum::{extract::FromRequestParts, http::request::Parts};
use realty_persistence::tenant::BoundContext;

use crate::error::RestError;

/// Axum extractor for the request's bound tenant context.
///
/// A handler that takes `Bound` can only run after the request was routed to
/// a ready partition. If the routing middleware was not applied the request
/// is rejected as an unknown tenant rather than served unbound.
///
/// # Example
///
/// ```rust,ignore
/// use realty_rest::extractors::Bound;
///
/// async fn handler(Bound(ctx): Bound) {
///     println!("Partition: {}", ctx.current_partition());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Bound(pub BoundContext);

impl Bound {
    /// Returns a reference to the bound context.
    pub fn context(&self) -> &BoundContext {
        &self.0
    }

    /// Consumes the extractor and returns the bound context.
    pub fn into_context(self) -> BoundContext {
        self.0
    }
}

impl<S> FromRequestParts<S> for Bound
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<BoundContext>()
            .cloned()
            .map(Bound)
            .ok_or_else(|| {
                tracing::error!(path = %parts.uri.path(), "Request reached a tenant handler unbound");
                RestError::UnknownTenant
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use realty_persistence::tenant::{PartitionId, PartitionRef, PartitionStatus, TenantId};

    fn context() -> BoundContext {
        let partition = PartitionRef {
            tenant_id: TenantId::new("acme"),
            partition_id: PartitionId::parse("tenant_acme").unwrap(),
            status: PartitionStatus::Ready,
        };
        BoundContext::bind(partition, PartitionId::parse("shared").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_extracts_bound_context() {
        let mut parts = Request::builder().body(()).unwrap().into_parts().0;
        parts.extensions.insert(context());

        let Bound(ctx) = Bound::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.current_partition().as_str(), "tenant_acme");
    }

    #[tokio::test]
    async fn test_unbound_request_rejected() {
        let mut parts = Request::builder().body(()).unwrap().into_parts().0;
        let result = Bound::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(RestError::UnknownTenant)));
    }
}
