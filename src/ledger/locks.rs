use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// per-key mutual exclusion
///
/// Operations on the same key run one at a time; different keys proceed in
/// parallel. An entry lives only while some caller holds or waits on it.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, key: &K) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// run `f` while holding the lock for `key`
    pub fn with_lock<R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(key);
        let result = {
            let _guard = lock.lock();
            f()
        };
        self.release(key, lock);
        result
    }

    fn release(&self, key: &K, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        // the registry and `lock` are the only owners, so nobody else waits
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    /// number of keys currently held or waited on
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}
