//! Per-collection write locks
//!
//! Every mutation of a collection holds that collection's lock for the
//! whole read-modify-write, so two writers can never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Registry of one async mutex per collection name
///
/// The registry map itself is guarded by a short-lived `parking_lot` mutex
/// that is never held across an `.await`. An entry lives only while some
/// task holds or waits for its lock.
#[derive(Default)]
pub struct CollectionLocks {
    locks: Registry,
}

/// Held while a collection is being mutated
///
/// Dropping the guard releases the lock and removes the registry entry if
/// no other task is waiting on it.
pub struct CollectionGuard {
    guard: Option<OwnedMutexGuard<()>>,
    name: String,
    registry: Registry,
}

impl CollectionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `name`
    pub async fn acquire(&self, name: &str) -> CollectionGuard {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(name.to_string()).or_default())
        };

        CollectionGuard {
            guard: Some(lock.lock_owned().await),
            name: name.to_string(),
            registry: Arc::clone(&self.locks),
        }
    }

    /// Number of names currently in the registry
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for CollectionGuard {
    fn drop(&mut self) {
        // Registry lock first: no task can clone the entry while we decide
        let mut locks = self.registry.lock();
        drop(self.guard.take());

        let idle = locks
            .get(&self.name)
            .map_or(false, |lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.name);
        }
    }
}
