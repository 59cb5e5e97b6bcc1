//! Per-tenant mutual exclusion.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::tenant::TenantId;

type LockMap = HashMap<TenantId, Arc<AsyncMutex<()>>>;

/// One async lock per tenant, created on demand and dropped when unused.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    locks: Arc<Mutex<LockMap>>,
}

impl InFlight {
    /// Waits until no other holder exists for the tenant.
    pub(crate) async fn acquire(&self, tenant_id: &TenantId) -> TenantGuard {
        let lock = self
            .locks
            .lock()
            .entry(tenant_id.clone())
            .or_default()
            .clone();
        let guard = lock.clone().lock_owned().await;

        TenantGuard {
            tenant_id: tenant_id.clone(),
            lock,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Returns the number of tenants with a held or awaited lock.
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Held for the duration of one provisioning or migration call.
pub(crate) struct TenantGuard {
    tenant_id: TenantId,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for TenantGuard {
    fn drop(&mut self) {
        self.guard.take();

        // Waiters clone the Arc under the map lock, so a count of two (the
        // map and this guard) means nobody else is queued.
        let mut locks = self.locks.lock();
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.tenant_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let in_flight = InFlight::default();
        let tenant = TenantId::new("acme");

        let guard = in_flight.acquire(&tenant).await;
        assert_eq!(in_flight.len(), 1);
        drop(guard);
        assert_eq!(in_flight.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_tenant_serialized() {
        let in_flight = Arc::new(InFlight::default());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let in_flight = Arc::clone(&in_flight);
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            handles.push(tokio::spawn(async move {
                let _guard = in_flight.acquire(&TenantId::new("acme")).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(in_flight.len(), 0);
    }

    #[tokio::test]
    async fn test_different_tenants_do_not_block() {
        let in_flight = InFlight::default();
        let _acme = in_flight.acquire(&TenantId::new("acme")).await;

        let globex = tokio::time::timeout(
            Duration::from_secs(1),
            in_flight.acquire(&TenantId::new("globex")),
        )
        .await;
        assert!(globex.is_ok());
        assert_eq!(in_flight.len(), 2);
    }
}
