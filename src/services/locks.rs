//! Per-resource serialization of configuration operations
//!
//! Two operations targeting the same interface or radio must not interleave
//! their command sequences. Operations on different resources proceed
//! concurrently.

use log::debug;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, PoisonError},
};
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<Mutex<()>>>;

/// Entries exist only while a resource is held or awaited.
#[derive(Clone, Default)]
pub struct ResourceLocks {
    locks: Arc<StdMutex<LockMap>>,
}

/// Held for the duration of one operation on `resource`.
pub struct ResourceGuard {
    resource: String,
    locks: Arc<StdMutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.resource)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.resource);
        }

        debug!("released {}", self.resource);
    }
}

impl ResourceLocks {
    pub async fn acquire(&self, resource: &str) -> ResourceGuard {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(resource.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        debug!("waiting for {resource}");
        let guard = lock.lock_owned().await;
        debug!("acquired {resource}");

        ResourceGuard {
            resource: resource.to_string(),
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
