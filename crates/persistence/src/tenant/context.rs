//! Request-scoped partition binding.
//!
//! This module defines [`BoundContext`], the value produced by routing a
//! request and required by ALL entity storage operations. It is an explicit
//! value threaded through the call chain; there is no ambient "current
//! partition" anywhere in the process.

use std::sync::Arc;

use super::id::{PartitionId, TenantId};
use super::record::{PartitionRef, PartitionStatus};
use crate::catalog::PartitionClass;
use crate::error::{IsolationError, TenantError};

/// The partition binding of a single request.
///
/// A `BoundContext` can only be created from a [`PartitionRef`] whose status
/// is [`PartitionStatus::Ready`]. It has no setters: once a request is bound,
/// the binding cannot change for the rest of the request. Cloning is cheap
/// and clones share the same binding.
///
/// # Examples
///
/// ```
/// use realty_persistence::catalog::PartitionClass;
/// use realty_persistence::tenant::{
///     BoundContext, PartitionId, PartitionRef, PartitionStatus, TenantId,
/// };
///
/// let partition = PartitionRef {
///     tenant_id: TenantId::new("acme"),
///     partition_id: PartitionId::new_unchecked("tenant_acme"),
///     status: PartitionStatus::Ready,
/// };
/// let ctx = BoundContext::bind(partition, PartitionId::new_unchecked("shared")).unwrap();
///
/// assert_eq!(ctx.current_partition().as_str(), "tenant_acme");
/// assert_eq!(ctx.partition_for(PartitionClass::Shared).as_str(), "shared");
/// ```
#[derive(Debug, Clone)]
pub struct BoundContext {
    inner: Arc<Binding>,
}

#[derive(Debug)]
struct Binding {
    tenant_id: TenantId,
    partition: PartitionId,
    shared: PartitionId,
    correlation_id: Option<String>,
}

impl BoundContext {
    /// Binds to a ready partition.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::UnknownTenant`] if the partition is not ready;
    /// a partition that is pending, failed or inactive must never serve
    /// traffic.
    pub fn bind(partition: PartitionRef, shared: PartitionId) -> Result<Self, TenantError> {
        Self::bind_with_correlation(partition, shared, None)
    }

    /// Binds to a ready partition and records the request's correlation ID.
    pub fn bind_with_correlation(
        partition: PartitionRef,
        shared: PartitionId,
        correlation_id: Option<String>,
    ) -> Result<Self, TenantError> {
        if partition.status != PartitionStatus::Ready {
            return Err(TenantError::UnknownTenant {
                routing_key: partition.tenant_id.to_string(),
            });
        }

        Ok(Self {
            inner: Arc::new(Binding {
                tenant_id: partition.tenant_id,
                partition: partition.partition_id,
                shared,
                correlation_id,
            }),
        })
    }

    /// Returns the tenant this request is bound to.
    pub fn tenant_id(&self) -> &TenantId {
        &self.inner.tenant_id
    }

    /// Returns the isolated partition this request is bound to.
    ///
    /// Data-access code uses this to select the schema for every
    /// tenant-owned query.
    pub fn current_partition(&self) -> &PartitionId {
        &self.inner.partition
    }

    /// Returns the shared partition.
    pub fn shared_partition(&self) -> &PartitionId {
        &self.inner.shared
    }

    /// Returns the correlation ID of the request, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        self.inner.correlation_id.as_deref()
    }

    /// Returns the partition an entity of the given class lives in.
    pub fn partition_for(&self, class: PartitionClass) -> &PartitionId {
        match class {
            PartitionClass::Isolated => &self.inner.partition,
            PartitionClass::Shared => &self.inner.shared,
        }
    }

    /// Checks that a partition is reachable from this context.
    ///
    /// Only the bound partition and the shared partition are reachable.
    /// Anything else is an isolation breach: the violation is logged on the
    /// `realty::isolation_breach` target and returned to the caller.
    pub fn check_access(&self, requested: &PartitionId) -> Result<(), IsolationError> {
        if requested == &self.inner.partition || requested == &self.inner.shared {
            return Ok(());
        }

        tracing::error!(
            target: "realty::isolation_breach",
            tenant_id = %self.inner.tenant_id,
            bound = %self.inner.partition,
            requested = %requested,
            correlation_id = self.inner.correlation_id.as_deref().unwrap_or("-"),
            "cross-partition access attempted"
        );

        Err(IsolationError::CrossPartitionAccess {
            bound: self.inner.partition.clone(),
            requested: requested.clone(),
        })
    }
}
