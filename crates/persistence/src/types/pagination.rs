//! Pagination types for entity listings.
//!
//! Listings are offset-based and ordered by creation time, then ID, so pages
//! are stable while rows are only appended.

use serde::{Deserialize, Serialize};

/// Default page size.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Requested page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of items to return.
    pub count: u32,
    /// Number of items to skip.
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            count: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Creates a page window.
    pub fn new(count: u32, offset: u32) -> Self {
        Self { count, offset }
    }

    /// Returns the window of the following page.
    pub fn next(&self) -> Self {
        Self {
            count: self.count,
            offset: self.offset.saturating_add(self.count),
        }
    }
}

/// A page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total: u64,
    /// The window that produced this page.
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Creates a page.
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            pagination,
        }
    }

    /// Returns `true` if items exist beyond this page.
    pub fn has_more(&self) -> bool {
        u64::from(self.pagination.offset) + (self.items.len() as u64) < self.total
    }
}
