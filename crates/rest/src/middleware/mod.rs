//! HTTP middleware for the realty REST API.
//!
//! - [`tenant`] - Host-based tenant routing

pub mod tenant;

pub use tenant::{X_REQUEST_ID, tenant_routing_middleware};
