//! Pagination extractor.
//!
//! Extracts `count` and `offset` query parameters for entity lists, applying
//! the server's default and maximum page sizes.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use realty_persistence::types::Pagination;
use serde::Deserialize;

use crate::error::RestError;
use crate::state::{AppState, AppStorage};

/// Axum extractor for list pagination.
///
/// # Example
///
/// ```rust,ignore
/// use realty_rest::extractors::PageQuery;
///
/// async fn list_handler(page: PageQuery) {
///     let window = page.pagination();
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    count: u32,
    offset: u32,
}

#[derive(Debug, Deserialize)]
struct RawPageQuery {
    count: Option<u32>,
    offset: Option<u32>,
}

impl PageQuery {
    /// Creates a page query, capping `count` at `max_count`.
    pub fn new(count: u32, offset: u32, max_count: u32) -> Self {
        Self {
            count: count.min(max_count),
            offset,
        }
    }

    /// Returns the page size.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns the offset.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Returns the storage-level page window.
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.count, self.offset)
    }
}

impl<S: AppStorage> FromRequestParts<AppState<S>> for PageQuery {
    type Rejection = RestError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<RawPageQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e| RestError::BadRequest {
                message: format!("Invalid pagination parameters: {}", e.body_text()),
            })?;

        let count = match query.count {
            Some(0) => {
                return Err(RestError::BadRequest {
                    message: "count must be at least 1".to_string(),
                });
            }
            Some(count) => count,
            None => state.default_page_size(),
        };

        Ok(PageQuery::new(
            count,
            query.offset.unwrap_or(0),
            state.max_page_size(),
        ))
    }
}
