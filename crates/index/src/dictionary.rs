//! Asynchronous dictionary maintenance
//!
//! Writers never touch Dictionary rows directly. After a document commit they
//! enqueue `+1`/`-1` deltas per (field, term); a single background thread sums
//! them per key and applies the totals in one atomic batch per flush.
//!
//! # Flush triggers
//!
//! - the flush interval elapsed since the first pending delta arrived
//! - the number of pending keys reached the batch threshold
//! - a caller asked for a drain (or the updater is shutting down)
//!
//! # Failure handling
//!
//! A failed flush puts its deltas back into the pending map and is retried
//! after one flush interval. Failures are logged and counted; they never
//! reach writers. A count that would drop below zero is clamped: the row is
//! deleted and the underflow is logged and counted.
//!
//! # Drain
//!
//! Every `enqueue` bumps a sequence number. `drain` waits until the flushed
//! sequence catches up with the value it read on entry, so it covers exactly
//! the deltas enqueued before the call.

use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use strata_core::{DictionaryConfig, IndexError, Result};
use strata_storage::{KvStore, WriteBatch};
use tracing::{debug, warn};

use crate::rows::{dictionary_key, DictionaryRow};

/// A (field, term) pair identifying one Dictionary row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DictionaryKey {
    /// Field index
    pub field: u16,
    /// Term bytes
    pub term: Vec<u8>,
}

impl DictionaryKey {
    /// Create a key
    pub fn new(field: u16, term: Vec<u8>) -> Self {
        Self { field, term }
    }

    /// Encoded Dictionary row key
    pub fn row_key(&self) -> Vec<u8> {
        dictionary_key(self.field, &self.term)
    }
}

/// Dictionary updater counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DictionaryStats {
    /// Successful flushes
    pub flushes: u64,
    /// Failed flushes (each retried later)
    pub flush_errors: u64,
    /// Per-key deltas applied by successful flushes
    pub deltas_applied: u64,
    /// Counts clamped at zero
    pub underflows: u64,
    /// Keys currently waiting for a flush
    pub pending: usize,
}

#[derive(Default)]
struct State {
    pending: FxHashMap<DictionaryKey, i64>,
    /// Sequence of the most recent enqueue
    enqueued: u64,
    /// Every enqueue up to this sequence is durable
    flushed: u64,
    flush_requested: bool,
    shutdown: bool,
    exited: bool,
}

struct Shared {
    state: Mutex<State>,
    work_ready: Condvar,
    drained: Condvar,
    store: Arc<dyn KvStore>,
    config: DictionaryConfig,
    flushes: AtomicU64,
    flush_errors: AtomicU64,
    deltas_applied: AtomicU64,
    underflows: AtomicU64,
}

/// Background coalescing writer of Dictionary rows
pub struct DictionaryUpdater {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DictionaryUpdater {
    /// Start the updater thread
    pub fn start(store: Arc<dyn KvStore>, config: DictionaryConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            work_ready: Condvar::new(),
            drained: Condvar::new(),
            store,
            config,
            flushes: AtomicU64::new(0),
            flush_errors: AtomicU64::new(0),
            deltas_applied: AtomicU64::new(0),
            underflows: AtomicU64::new(0),
        });
        let shared_clone = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("strata-dict".to_string())
            .spawn(move || worker_loop(&shared_clone))
            .map_err(|e| IndexError::Config(format!("failed to spawn dictionary updater: {}", e)))?;
        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Queue deltas; same-key deltas are summed until flushed
    pub fn enqueue(&self, deltas: impl IntoIterator<Item = (DictionaryKey, i64)>) -> Result<()> {
        let mut deltas = deltas.into_iter().peekable();
        if deltas.peek().is_none() {
            return Ok(());
        }
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(IndexError::Closed);
        }
        for (key, delta) in deltas {
            merge_delta(&mut state.pending, key, delta);
        }
        state.enqueued += 1;
        self.shared.work_ready.notify_one();
        Ok(())
    }

    /// Block until every delta enqueued before this call is flushed
    ///
    /// On timeout the deltas stay queued and `DrainTimeout` is returned.
    pub fn drain(&self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut state = self.shared.state.lock();
        let target = state.enqueued;
        if state.flushed >= target {
            return Ok(());
        }
        state.flush_requested = true;
        self.shared.work_ready.notify_one();

        while state.flushed < target {
            if state.exited {
                break;
            }
            if self
                .shared
                .drained
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
        if state.flushed >= target {
            return Ok(());
        }
        let pending = state.pending.len();
        drop(state);
        warn!(
            target: "strata::dict",
            waited_ms = start.elapsed().as_millis() as u64,
            pending,
            "Dictionary drain timed out"
        );
        Err(IndexError::DrainTimeout {
            waited: start.elapsed(),
            pending,
        })
    }

    /// Flush what is pending and stop the worker thread
    ///
    /// Idempotent. Deltas that cannot be flushed during shutdown are logged
    /// and dropped; call [`drain`](Self::drain) first to surface failures.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.flush_requested = true;
            self.shared.work_ready.notify_all();
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }

    /// Number of keys waiting for a flush
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Counter snapshot
    pub fn stats(&self) -> DictionaryStats {
        DictionaryStats {
            flushes: self.shared.flushes.load(Ordering::Relaxed),
            flush_errors: self.shared.flush_errors.load(Ordering::Relaxed),
            deltas_applied: self.shared.deltas_applied.load(Ordering::Relaxed),
            underflows: self.shared.underflows.load(Ordering::Relaxed),
            pending: self.pending(),
        }
    }
}

impl Drop for DictionaryUpdater {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Add `delta` to the pending total of `key`, dropping keys that net to zero
fn merge_delta(pending: &mut FxHashMap<DictionaryKey, i64>, key: DictionaryKey, delta: i64) {
    match pending.entry(key) {
        Entry::Occupied(mut entry) => {
            *entry.get_mut() += delta;
            if *entry.get() == 0 {
                entry.remove();
            }
        }
        Entry::Vacant(entry) => {
            if delta != 0 {
                entry.insert(delta);
            }
        }
    }
}

fn worker_loop(shared: &Shared) {
    let interval = shared.config.flush_interval();
    let threshold = shared.config.batch_threshold;
    let mut backoff = false;

    loop {
        let (batch, sequence, shutting_down) = {
            let mut state = shared.state.lock();
            if backoff {
                if !state.shutdown {
                    shared.work_ready.wait_for(&mut state, interval);
                }
            } else {
                let mut deadline = Instant::now() + interval;
                while !state.shutdown && !state.flush_requested && state.pending.len() < threshold {
                    if state.pending.is_empty() {
                        shared.work_ready.wait(&mut state);
                        // The first pending delta starts the clock
                        deadline = Instant::now() + interval;
                    } else if shared.work_ready.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
            }
            state.flush_requested = false;
            (
                std::mem::take(&mut state.pending),
                state.enqueued,
                state.shutdown,
            )
        };
        backoff = false;

        let result = if batch.is_empty() {
            Ok(0)
        } else {
            flush(shared, &batch)
        };

        let mut state = shared.state.lock();
        match result {
            Ok(underflows) => {
                if !batch.is_empty() {
                    shared.flushes.fetch_add(1, Ordering::Relaxed);
                    shared
                        .deltas_applied
                        .fetch_add(batch.len() as u64, Ordering::Relaxed);
                    shared.underflows.fetch_add(underflows, Ordering::Relaxed);
                    debug!(target: "strata::dict", keys = batch.len(), underflows, "Flushed dictionary deltas");
                }
                state.flushed = state.flushed.max(sequence);
            }
            Err(e) => {
                shared.flush_errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "strata::dict",
                    keys = batch.len(),
                    error = %e,
                    "Dictionary flush failed, will retry"
                );
                // Later enqueues may already hold the same keys
                for (key, delta) in batch {
                    merge_delta(&mut state.pending, key, delta);
                }
                backoff = true;
            }
        }

        if shutting_down {
            if !state.pending.is_empty() {
                warn!(
                    target: "strata::dict",
                    pending = state.pending.len(),
                    "Dictionary updater stopped with unflushed deltas"
                );
            }
            state.exited = true;
            shared.drained.notify_all();
            return;
        }
        shared.drained.notify_all();
    }
}

/// Apply one coalesced batch; returns the number of underflows
fn flush(shared: &Shared, batch: &FxHashMap<DictionaryKey, i64>) -> Result<u64> {
    let mut keys: Vec<(&DictionaryKey, i64)> = batch.iter().map(|(k, d)| (k, *d)).collect();
    keys.sort();

    let mut write = WriteBatch::with_capacity(keys.len());
    let mut underflows = 0u64;
    for (key, delta) in keys {
        let row_key = key.row_key();
        let count = match shared.store.get(&row_key).map_err(IndexError::StoreRead)? {
            Some(value) => DictionaryRow::decode_count(&value)?,
            None => 0,
        };
        let next = count as i128 + delta as i128;
        if next > 0 {
            write.set(row_key, DictionaryRow::encode_count(next as u64));
        } else {
            if next < 0 {
                let underflow = IndexError::DictionaryUnderflow {
                    field: key.field,
                    term: key.term.clone(),
                    count,
                    delta,
                };
                warn!(target: "strata::dict", error = %underflow, "Clamping dictionary count at zero");
                underflows += 1;
            }
            write.delete(row_key);
        }
    }
    shared.store.commit(write).map_err(IndexError::StoreWrite)?;
    Ok(underflows)
}
