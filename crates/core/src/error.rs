//! Error types for the row index
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Two layers exist:
//! - [`StoreError`]: failures reported by a key-value store backend
//! - [`IndexError`]: everything the indexing core surfaces to its callers
//!
//! Store errors are wrapped into `IndexError::StoreRead` / `IndexError::StoreWrite`
//! depending on which side of the operation failed, so callers can tell a safe
//! retry (write failed, nothing changed) from an aborted read.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors reported by a key-value store backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend failed to perform the operation
    #[error("Storage backend failure: {0}")]
    Backend(String),

    /// The store has been closed and accepts no further operations
    #[error("Store is closed")]
    Closed,
}

impl StoreError {
    /// Convenience constructor for backend failures
    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }
}

/// Error types for the indexing core
#[derive(Debug, Error)]
pub enum IndexError {
    /// A row key or value failed to decode
    ///
    /// Never repaired automatically.
    #[error("Corrupt {kind} row: {reason}")]
    CorruptRow {
        /// Row kind that failed to decode ("term", "stored", ...)
        kind: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// The atomic batch write failed; document state is unchanged
    #[error("Store write failed: {0}")]
    StoreWrite(#[source] StoreError),

    /// A read from the store failed; the operation was aborted
    #[error("Store read failed: {0}")]
    StoreRead(#[source] StoreError),

    /// Dictionary drain did not complete in the requested window
    #[error("Dictionary drain timed out after {waited:?} with {pending} delta(s) pending")]
    DrainTimeout {
        /// How long the caller waited
        waited: Duration,
        /// Number of distinct dictionary keys still pending
        pending: usize,
    },

    /// A dictionary decrement would drive a count below zero
    ///
    /// Internal-only: the updater logs and counts this condition and deletes
    /// the row. It is never returned from `update`/`delete`.
    #[error("Dictionary underflow for field {field}: count {count} with delta {delta}")]
    DictionaryUnderflow {
        /// Field index of the dictionary row
        field: u16,
        /// Term bytes of the dictionary row
        term: Vec<u8>,
        /// Count read from the store
        count: u64,
        /// Summed delta that was applied
        delta: i64,
    },

    /// Document analysis failed (analyzer panicked or the pool is gone)
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Caller supplied an invalid document or argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The store holds an index written with a different schema version
    #[error("Incompatible index version: expected {expected}, found {found}")]
    IncompatibleVersion {
        /// Version this build writes
        expected: u8,
        /// Version found in the store
        found: u8,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The index has been closed
    #[error("Index is closed")]
    Closed,
}

impl IndexError {
    /// Create a `CorruptRow` error
    pub fn corrupt(kind: &'static str, reason: impl Into<String>) -> Self {
        IndexError::CorruptRow {
            kind,
            reason: reason.into(),
        }
    }

    /// Create an `InvalidInput` error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        IndexError::InvalidInput(msg.into())
    }

    /// Whether retrying the same operation may succeed
    ///
    /// Write failures leave the document untouched and drain timeouts leave
    /// queued work intact, so both are retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IndexError::StoreWrite(_) | IndexError::StoreRead(_) | IndexError::DrainTimeout { .. }
        )
    }
}
