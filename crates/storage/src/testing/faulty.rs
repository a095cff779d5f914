//! Failure injection wrapper
//!
//! Every switch is an atomic so a test can flip it from one thread while the
//! code under test runs on others.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use strata_core::{StoreError, StoreResult};

use crate::kv::{KvSnapshot, KvStore, WriteBatch};

/// A store wrapper that fails operations on request
#[derive(Debug, Default)]
pub struct FaultyStore<S> {
    inner: S,
    /// Fail every commit while set
    fail_commits: AtomicBool,
    /// Fail the next N commits, then recover
    fail_next_commits: AtomicUsize,
    /// Fail every read (get, snapshot) while set
    fail_reads: AtomicBool,
    /// Commits rejected by injection
    injected_failures: AtomicU64,
}

impl<S: KvStore> FaultyStore<S> {
    /// Wrap a store with all faults disabled
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_commits: AtomicBool::new(false),
            fail_next_commits: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            injected_failures: AtomicU64::new(0),
        }
    }

    /// Fail all commits (and single-key writes) until turned off
    pub fn fail_commits(&self, on: bool) {
        self.fail_commits.store(on, Ordering::SeqCst);
    }

    /// Fail exactly the next `n` commits
    pub fn fail_next_commits(&self, n: usize) {
        self.fail_next_commits.store(n, Ordering::SeqCst);
    }

    /// Fail all reads until turned off
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Number of writes rejected so far
    pub fn injected_failures(&self) -> u64 {
        self.injected_failures.load(Ordering::SeqCst)
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check_write(&self) -> StoreResult<()> {
        let countdown = self
            .fail_next_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if countdown || self.fail_commits.load(Ordering::SeqCst) {
            self.injected_failures.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::backend("injected write failure"));
        }
        Ok(())
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::backend("injected read failure"));
        }
        Ok(())
    }
}

impl<S: KvStore> KvStore for FaultyStore<S> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.check_read()?;
        self.inner.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.check_write()?;
        self.inner.set(key, value)
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.check_write()?;
        self.inner.delete(key)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.check_write()?;
        self.inner.commit(batch)
    }

    fn snapshot(&self) -> StoreResult<Arc<dyn KvSnapshot>> {
        self.check_read()?;
        self.inner.snapshot()
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }
}
