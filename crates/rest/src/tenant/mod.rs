//! Host-based tenant routing.
//!
//! Every business request is bound to exactly one partition before any
//! handler runs. The routing key is the request host, read from:
//!
//! - **X-Forwarded-Host**: only when `trust_forwarded_host` is enabled
//! - **Host header**: the normal case for HTTP/1.1
//! - **URI authority**: HTTP/2 requests without a `Host` header
//!
//! The first source present wins. The value is normalized into a
//! [`RoutingKey`](realty_persistence::tenant::RoutingKey) and resolved through
//! the partition registry. Hosts that are missing, malformed or unregistered
//! are all rejected the same way, as an unknown tenant.
//!
//! # Example
//!
//! ```rust,ignore
//! use realty_rest::tenant::TenantRouter;
//!
//! let router = TenantRouter::new(registry, false);
//! let ctx = router.route(&parts, Some(request_id)).await?;
//! println!("Bound to {}", ctx.current_partition());
//! ```

mod resolver;
mod source;

pub use resolver::{
    AuthorityExtractor, ForwardedHostExtractor, HostHeaderExtractor, HostSourceExtractor,
    TenantRouter,
};
pub use source::HostSource;
