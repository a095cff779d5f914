//! Key-value store contract
//!
//! The index core writes its rows into any ordered byte-key store that
//! implements [`KvStore`]. Requirements on implementations:
//!
//! - Keys are ordered bytewise (lexicographic, shorter prefix first)
//! - `commit` applies a [`WriteBatch`] all-or-nothing
//! - Snapshots and iterators observe one consistent point in time and are
//!   unaffected by later writes
//! - All methods are safe to call concurrently (Send + Sync)

use std::sync::Arc;
use strata_core::StoreResult;

/// A key-value pair as returned by iterators
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Lazy ordered iterator over a snapshot
///
/// Owns whatever it needs to keep its snapshot alive.
pub type KvIterator = Box<dyn Iterator<Item = StoreResult<KvPair>> + Send>;

/// One staged operation in a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or overwrite a key
    Set(Vec<u8>, Vec<u8>),
    /// Remove a key (no-op if absent)
    Delete(Vec<u8>),
}

impl BatchOp {
    /// Key this operation touches
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Set(k, _) | BatchOp::Delete(k) => k,
        }
    }
}

/// Staged sets and deletes, committed atomically via [`KvStore::commit`]
///
/// Operations apply in the order they were staged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty batch with room for `n` operations
    pub fn with_capacity(n: usize) -> Self {
        Self {
            ops: Vec::with_capacity(n),
        }
    }

    /// Stage a set
    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Set(key.into(), value.into()));
    }

    /// Stage a delete
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete(key.into()));
    }

    /// Number of staged operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is staged
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Staged operations in order
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Consume the batch into its operations
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Point-in-time read view of a store
pub trait KvSnapshot: Send + Sync {
    /// Read one key
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Iterate in key order starting at `start` (inclusive) to the end
    fn iter_from(&self, start: &[u8]) -> StoreResult<KvIterator>;

    /// Iterate every key starting with `prefix`, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<KvIterator> {
        let iter = self.iter_from(prefix)?;
        Ok(bounded_by_prefix(iter, prefix.to_vec()))
    }
}

/// Ordered byte-key store
pub trait KvStore: Send + Sync {
    /// Read one key
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Write one key
    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Remove one key (no-op if absent)
    fn delete(&self, key: &[u8]) -> StoreResult<()>;

    /// Apply every staged operation atomically
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Open a consistent point-in-time view
    fn snapshot(&self) -> StoreResult<Arc<dyn KvSnapshot>>;

    /// Iterate from `start` over a fresh snapshot
    fn iter_from(&self, start: &[u8]) -> StoreResult<KvIterator> {
        self.snapshot()?.iter_from(start)
    }

    /// Iterate every key starting with `prefix` over a fresh snapshot
    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<KvIterator> {
        self.snapshot()?.scan_prefix(prefix)
    }

    /// Release backend resources; later calls fail with `StoreError::Closed`
    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Stop an iterator at the first key outside `prefix`
///
/// Errors pass through so callers see them.
pub fn bounded_by_prefix(iter: KvIterator, prefix: Vec<u8>) -> KvIterator {
    Box::new(iter.take_while(move |item| match item {
        Ok((key, _)) => key.starts_with(&prefix),
        Err(_) => true,
    }))
}
