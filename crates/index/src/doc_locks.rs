//! Per-document mutual exclusion
//!
//! Updates and deletes of one document id are serialized; different ids never
//! contend. Lock entries exist only while someone holds or waits for them.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Table of per-id locks
#[derive(Debug, Default)]
pub struct DocLocks {
    locks: DashMap<Vec<u8>, Arc<Mutex<()>>>,
}

impl DocLocks {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, id: &[u8]) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(id) {
            return Arc::clone(&lock);
        }
        Arc::clone(&self.locks.entry(id.to_vec()).or_default())
    }

    fn release(&self, id: &[u8], lock: Arc<Mutex<()>>) {
        drop(lock);
        // Only the table's own reference left: nobody holds or waits
        self.locks.remove_if(id, |_, l| Arc::strong_count(l) == 1);
    }

    /// Run `f` while holding the lock of `id`
    pub fn with_doc<T>(&self, id: &[u8], f: impl FnOnce() -> T) -> T {
        let lock = self.handle(id);
        let result = {
            let _guard = lock.lock();
            f()
        };
        self.release(id, lock);
        result
    }

    /// Run `f` while holding the locks of every id
    ///
    /// Locks are taken in sorted id order so concurrent callers cannot
    /// deadlock. Duplicate ids are locked once.
    pub fn with_docs<T>(&self, ids: &[Vec<u8>], f: impl FnOnce() -> T) -> T {
        let mut sorted: Vec<&Vec<u8>> = ids.iter().collect();
        sorted.sort();
        sorted.dedup();

        let handles: Vec<(&Vec<u8>, Arc<Mutex<()>>)> =
            sorted.into_iter().map(|id| (id, self.handle(id))).collect();
        let result = {
            let _guards: Vec<_> = handles.iter().map(|(_, lock)| lock.lock()).collect();
            f()
        };
        for (id, lock) in handles {
            self.release(id, lock);
        }
        result
    }

    /// Number of ids currently locked or awaited
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no id is locked
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
