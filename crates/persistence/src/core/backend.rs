//! Backend abstraction for database drivers.
//!
//! The [`Backend`] trait covers what the HTTP layer needs from a driver
//! outside of tenant storage: a name for diagnostics and a readiness check.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::BackendError;

/// Lifecycle checks for a storage driver.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Returns a human-readable backend name.
    fn name(&self) -> &'static str;

    /// Checks that the backend is reachable and the registry is readable.
    async fn health_check(&self) -> Result<(), BackendError>;
}
