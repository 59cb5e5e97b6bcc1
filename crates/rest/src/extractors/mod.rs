//! Axum extractors for the realty REST API.
//!
//! - [`Bound`] - The request's bound tenant context
//! - [`PageQuery`] - List pagination parameters

mod pagination;
mod tenant;

pub use pagination::PageQuery;
pub use tenant::Bound;
