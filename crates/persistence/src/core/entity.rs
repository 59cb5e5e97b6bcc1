//! Partition-bound entity storage trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::catalog::EntityDefinition;
use crate::error::StorageResult;
use crate::tenant::BoundContext;
use crate::types::{Page, Pagination, StoredEntity};

/// CRUD access for business entities.
///
/// Every operation takes the request's [`BoundContext`]. The target partition
/// is always `ctx.partition_for(definition.class)`; there is no way to name a
/// partition directly.
///
/// # Example
///
/// ```ignore
/// use realty_persistence::core::EntityStorage;
///
/// async fn open_leases<S: EntityStorage>(storage: &S, ctx: &BoundContext, lease: &EntityDefinition) {
///     let page = storage.list(ctx, lease, Pagination::default()).await.unwrap();
///     println!("{} leases in {}", page.total, ctx.current_partition());
/// }
/// ```
#[async_trait]
pub trait EntityStorage: Send + Sync {
    /// Creates an entity instance.
    ///
    /// The record is validated against the definition. An `id` may be
    /// supplied; otherwise one is generated. Reference fields must point to
    /// existing rows reachable from the context.
    async fn create(
        &self,
        ctx: &BoundContext,
        definition: &EntityDefinition,
        record: Value,
    ) -> StorageResult<StoredEntity>;

    /// Reads an entity instance by ID.
    async fn read(
        &self,
        ctx: &BoundContext,
        definition: &EntityDefinition,
        id: &str,
    ) -> StorageResult<Option<StoredEntity>>;

    /// Lists entity instances, oldest first.
    async fn list(
        &self,
        ctx: &BoundContext,
        definition: &EntityDefinition,
        pagination: Pagination,
    ) -> StorageResult<Page<StoredEntity>>;

    /// Counts entity instances.
    async fn count(&self, ctx: &BoundContext, definition: &EntityDefinition) -> StorageResult<u64>;
}
