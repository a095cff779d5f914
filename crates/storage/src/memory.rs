//! MemoryStore: in-memory ordered store
//!
//! This module implements [`KvStore`] using:
//! - `BTreeMap<Vec<u8>, Vec<u8>>` for bytewise key order
//! - `parking_lot::RwLock` for thread-safe access
//! - `Arc` copy-on-write for snapshots
//!
//! # Design Notes
//!
//! - **Cheap snapshots**: a snapshot is an `Arc` clone of the current map.
//!   Writers call `Arc::make_mut`, so the map is deep-cloned only when a
//!   snapshot is still alive at the time of the write.
//! - **Write cost under readers**: that deep clone copies every key and
//!   value, so a write made while any snapshot, dump or scan is open costs
//!   O(store size). Long-lived readers over a large store turn every commit
//!   into a full copy; this store is meant for tests and small indexes.
//! - **Lazy iteration**: iterators hold the snapshot `Arc` plus the last key
//!   they returned and seek past it on every step, so nothing is collected
//!   up front.
//! - **Atomic batches**: a batch is applied under a single write lock, so no
//!   snapshot can observe part of it.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use strata_core::{StoreError, StoreResult};

use crate::kv::{BatchOp, KvIterator, KvPair, KvSnapshot, KvStore, WriteBatch};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory ordered key-value store
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Current map; replaced copy-on-write while snapshots hold the old one
    data: RwLock<Arc<Map>>,
    /// Set by `close()`
    closed: AtomicBool,
    /// Number of committed batches
    commits: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Number of batches committed so far
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.check_open()?;
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.check_open()?;
        let mut data = self.data.write();
        Arc::make_mut(&mut *data).insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.check_open()?;
        let mut data = self.data.write();
        if data.contains_key(key) {
            Arc::make_mut(&mut *data).remove(key);
        }
        Ok(())
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.check_open()?;
        if batch.is_empty() {
            return Ok(());
        }

        // Hold the write lock across the whole batch
        let mut data = self.data.write();
        let map = Arc::make_mut(&mut *data);
        for op in batch.into_ops() {
            match op {
                BatchOp::Set(key, value) => {
                    map.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    map.remove(&key);
                }
            }
        }
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn snapshot(&self) -> StoreResult<Arc<dyn KvSnapshot>> {
        self.check_open()?;
        let data = Arc::clone(&*self.data.read());
        Ok(Arc::new(MemorySnapshot { data }))
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Immutable view of a [`MemoryStore`] at one point in time
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    data: Arc<Map>,
}

impl KvSnapshot for MemorySnapshot {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn iter_from(&self, start: &[u8]) -> StoreResult<KvIterator> {
        Ok(Box::new(MemoryIter {
            data: Arc::clone(&self.data),
            lower: Bound::Included(start.to_vec()),
        }))
    }
}

/// Seeking iterator over a snapshot map
struct MemoryIter {
    data: Arc<Map>,
    lower: Bound<Vec<u8>>,
}

impl Iterator for MemoryIter {
    type Item = StoreResult<KvPair>;

    fn next(&mut self) -> Option<Self::Item> {
        let lower: Bound<&[u8]> = match &self.lower {
            Bound::Included(k) => Bound::Included(k.as_slice()),
            Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };
        let (key, value) = self
            .data
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()))?;
        self.lower = Bound::Excluded(key.clone());
        Some(Ok((key, value)))
    }
}
