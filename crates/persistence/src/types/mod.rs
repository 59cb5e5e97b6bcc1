//! Core types for entity storage.

mod pagination;
mod stored_entity;

pub use pagination::{DEFAULT_PAGE_SIZE, Page, Pagination};
pub use stored_entity::StoredEntity;
