//! Per-resource refresh locks.
//!
//! Locks are created on first use and dropped from the table once no caller holds
//! or waits on them. Clones of a lock are only handed out under the table mutex,
//! so a strong count of one (the table's own reference) means it is unused.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub(crate) struct RefreshLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RefreshLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive refresh rights on `resource`.
    pub(crate) async fn acquire(&self, resource: &str) -> ResourceGuard<'_> {
        let mut guard = ResourceGuard {
            locks: self,
            resource: resource.to_string(),
            guard: None,
        };

        let lock = self
            .locks
            .lock()
            .entry(resource.to_string())
            .or_default()
            .clone();
        guard.guard = Some(lock.lock_owned().await);
        guard
    }

    /// Number of resources with a live lock.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().len()
    }

    fn release(&self, resource: &str) {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(resource) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(resource);
            }
        }
    }
}

/// Exclusive refresh rights on one resource, released on drop.
pub(crate) struct ResourceGuard<'a> {
    locks: &'a RefreshLocks,
    resource: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.resource);
    }
}
