//! Host source identification.
//!
//! Defines where in a request the routing host was read from.

use std::fmt;

/// Source from which the routing host was extracted.
///
/// The router consults them in this order and the first one present wins:
/// 1. `X-Forwarded-Host` (only when the proxy is trusted)
/// 2. `Host` header
/// 3. URI authority (HTTP/2 `:authority`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostSource {
    /// `X-Forwarded-Host` set by a trusted reverse proxy.
    ForwardedHost,
    /// The `Host` header.
    HostHeader,
    /// The authority component of the request URI.
    Authority,
}

impl fmt::Display for HostSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostSource::ForwardedHost => write!(f, "x_forwarded_host"),
            HostSource::HostHeader => write!(f, "host"),
            HostSource::Authority => write!(f, "authority"),
        }
    }
}
