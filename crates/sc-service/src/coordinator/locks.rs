//! Per-key async locks.
//!
//! Serializes the check-then-create step of `initiate` per user pair or
//! room name. Entries are dropped once nobody holds or waits on them,
//! including waiters whose future was dropped before the lock was granted.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// The map mutex is never held across an await.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, KeyLock>>,
}

/// Interest in one key; removes the map entry on drop when it was the last.
struct Entry<'a> {
    owner: &'a KeyedLocks,
    key: String,
    lock: KeyLock,
}

impl Drop for Entry<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.map();
        // Map + this clone: no other holder or waiter.
        let unused = locks.get(&self.key).is_some_and(|current| {
            Arc::ptr_eq(current, &self.lock) && Arc::strong_count(&self.lock) <= 2
        });
        if unused {
            locks.remove(&self.key);
        }
    }
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, KeyLock>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `fut` while holding the lock for `key`.
    ///
    /// Dropping the returned future at any point releases the key.
    pub async fn run<F, T>(&self, key: String, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let lock = Arc::clone(self.map().entry(key.clone()).or_default());
        let entry = Entry {
            owner: self,
            key,
            lock,
        };

        let _guard = entry.lock.lock().await;
        fut.await
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}
