//! Index counters
//!
//! Writers bump lock-free counters; [`IndexCounters::snapshot`] combines them
//! with the dictionary updater's counters into a plain [`IndexStats`] value.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::dictionary::DictionaryStats;

/// Live counters owned by an index
#[derive(Debug, Default)]
pub struct IndexCounters {
    updates: AtomicU64,
    deletes: AtomicU64,
    batches: AtomicU64,
    errors: AtomicU64,
    rows_written: AtomicU64,
    rows_deleted: AtomicU64,
    analysis_nanos: AtomicU64,
    index_nanos: AtomicU64,
}

impl IndexCounters {
    /// All counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a successful update
    pub fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a successful delete
    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a successful batch and the operations inside it
    pub fn record_batch(&self, updates: usize, deletes: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.updates.fetch_add(updates as u64, Ordering::Relaxed);
        self.deletes.fetch_add(deletes as u64, Ordering::Relaxed);
    }

    /// Count a failed mutation
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count committed row writes
    pub fn record_rows(&self, written: usize, deleted: usize) {
        self.rows_written.fetch_add(written as u64, Ordering::Relaxed);
        self.rows_deleted.fetch_add(deleted as u64, Ordering::Relaxed);
    }

    /// Add time spent waiting for analysis
    pub fn record_analysis_time(&self, elapsed: Duration) {
        self.analysis_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Add time spent building, diffing and committing rows
    pub fn record_index_time(&self, elapsed: Duration) {
        self.index_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy
    pub fn snapshot(&self, doc_count: u64, fields: usize, dictionary: DictionaryStats) -> IndexStats {
        IndexStats {
            doc_count,
            fields,
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            rows_deleted: self.rows_deleted.load(Ordering::Relaxed),
            analysis_time: Duration::from_nanos(self.analysis_nanos.load(Ordering::Relaxed)),
            index_time: Duration::from_nanos(self.index_nanos.load(Ordering::Relaxed)),
            dictionary,
        }
    }
}

/// Index statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    /// Live documents
    pub doc_count: u64,
    /// Registered fields
    pub fields: usize,
    /// Successful updates (including those inside batches)
    pub updates: u64,
    /// Successful deletes (including those inside batches)
    pub deletes: u64,
    /// Successful batches
    pub batches: u64,
    /// Failed mutations
    pub errors: u64,
    /// Rows inserted or overwritten
    pub rows_written: u64,
    /// Rows removed
    pub rows_deleted: u64,
    /// Total time spent in analysis
    pub analysis_time: Duration,
    /// Total time spent building and committing rows
    pub index_time: Duration,
    /// Dictionary updater counters
    pub dictionary: DictionaryStats,
}

impl IndexStats {
    /// Successful mutations of any kind
    pub fn total_mutations(&self) -> u64 {
        self.updates + self.deletes
    }

    /// Failed mutations / all mutation attempts
    pub fn error_rate(&self) -> f64 {
        let attempts = self.total_mutations() + self.errors;
        if attempts > 0 {
            self.errors as f64 / attempts as f64
        } else {
            0.0
        }
    }
}
