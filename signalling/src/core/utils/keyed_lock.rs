use std::{future::Future, hash::Hash, sync::Arc};

use dashmap::DashMap;
use tokio::sync::Mutex;

/// One async mutex per key, created on first use and dropped once nobody
/// holds or waits for it.
///
/// Work for the same key runs one at a time in arrival order; different keys
/// never wait for each other.
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash> {
    locks: Arc<DashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash> Clone for KeyedLocks<K> {
    fn clone(&self) -> Self {
        Self {
            locks: self.locks.clone(),
        }
    }
}

impl<K: Eq + Hash> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work` while holding the lock of `key`.
    pub async fn run<F, T>(&self, key: K, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let lock = self.locks.entry(key.clone()).or_default().clone();

        let output = {
            let _held = lock.lock().await;
            work.await
        };

        drop(lock);
        // The map's own reference is the only one left when nobody waits.
        self.locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);

        output
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
