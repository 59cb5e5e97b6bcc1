//! Tenant routing from the request host.
//!
//! Provides the [`TenantRouter`], which turns an inbound request into a
//! [`BoundContext`] using a configurable list of host sources.

use std::sync::Arc;

use axum::http::{HeaderName, header::HOST, request::Parts};
use realty_persistence::core::PartitionRegistry;
use realty_persistence::error::{StorageResult, TenantError};
use realty_persistence::tenant::{BoundContext, RoutingKey};

use super::source::HostSource;

/// Header set by reverse proxies to carry the original host.
pub static X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Trait for extracting the routing host from a specific source.
pub trait HostSourceExtractor: Send + Sync {
    /// Attempts to extract a raw host value from the request.
    fn extract<'a>(&self, parts: &'a Parts) -> Option<&'a str>;

    /// Returns the source type this extractor handles.
    fn source_type(&self) -> HostSource;
}

/// Extracts the first host of `X-Forwarded-Host`.
#[derive(Debug, Default)]
pub struct ForwardedHostExtractor;

impl HostSourceExtractor for ForwardedHostExtractor {
    fn extract<'a>(&self, parts: &'a Parts) -> Option<&'a str> {
        parts
            .headers
            .get(&X_FORWARDED_HOST)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn source_type(&self) -> HostSource {
        HostSource::ForwardedHost
    }
}

/// Extracts the `Host` header.
#[derive(Debug, Default)]
pub struct HostHeaderExtractor;

impl HostSourceExtractor for HostHeaderExtractor {
    fn extract<'a>(&self, parts: &'a Parts) -> Option<&'a str> {
        parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.trim().is_empty())
    }

    fn source_type(&self) -> HostSource {
        HostSource::HostHeader
    }
}

/// Extracts the host of an absolute request URI.
#[derive(Debug, Default)]
pub struct AuthorityExtractor;

impl HostSourceExtractor for AuthorityExtractor {
    fn extract<'a>(&self, parts: &'a Parts) -> Option<&'a str> {
        parts.uri.authority().map(|a| a.host())
    }

    fn source_type(&self) -> HostSource {
        HostSource::Authority
    }
}

/// Binds requests to tenant partitions.
///
/// The router holds no per-request state. Each call to [`route`](Self::route)
/// returns a fresh, immutable [`BoundContext`] that the caller attaches to its
/// own request.
pub struct TenantRouter<R> {
    registry: Arc<R>,
    extractors: Vec<Box<dyn HostSourceExtractor>>,
}

impl<R> TenantRouter<R> {
    /// Creates a router over the given registry.
    ///
    /// `X-Forwarded-Host` is consulted only when `trust_forwarded_host` is
    /// set; otherwise any client could pick its tenant.
    pub fn new(registry: Arc<R>, trust_forwarded_host: bool) -> Self {
        let mut extractors: Vec<Box<dyn HostSourceExtractor>> = Vec::new();
        if trust_forwarded_host {
            extractors.push(Box::new(ForwardedHostExtractor));
        }
        extractors.push(Box::new(HostHeaderExtractor));
        extractors.push(Box::new(AuthorityExtractor));

        Self {
            registry,
            extractors,
        }
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Returns the first host value present and where it came from.
    pub fn extract_host<'a>(&self, parts: &'a Parts) -> Option<(HostSource, &'a str)> {
        self.extractors
            .iter()
            .find_map(|e| e.extract(parts).map(|host| (e.source_type(), host)))
    }

    /// Normalizes the request host into a routing key.
    ///
    /// A missing or malformed host is reported as an unknown tenant.
    pub fn routing_key(&self, parts: &Parts) -> Result<RoutingKey, TenantError> {
        let (source, host) = self.extract_host(parts).ok_or_else(|| TenantError::UnknownTenant {
            routing_key: String::new(),
        })?;

        RoutingKey::parse(host).map_err(|e| {
            tracing::debug!(source = %source, host = %host, error = %e, "Rejected malformed host");
            TenantError::UnknownTenant {
                routing_key: host.to_string(),
            }
        })
    }
}

impl<R: PartitionRegistry> TenantRouter<R> {
    /// Resolves the request host and binds a context to its partition.
    pub async fn route(
        &self,
        parts: &Parts,
        correlation_id: Option<String>,
    ) -> StorageResult<BoundContext> {
        let key = self.routing_key(parts)?;
        let partition =
            self.registry
                .resolve(&key)
                .await?
                .ok_or_else(|| TenantError::UnknownTenant {
                    routing_key: key.as_str().to_string(),
                })?;

        let ctx = BoundContext::bind_with_correlation(
            partition,
            self.registry.shared_partition().clone(),
            correlation_id,
        )?;
        Ok(ctx)
    }
}
