//! Testing utilities for code built on top of a [`KvStore`](crate::KvStore)
//!
//! - **FaultyStore**: wraps a store and injects read/write failures on demand
//!
//! # Example
//!
//! ```ignore
//! use strata_storage::testing::FaultyStore;
//! use strata_storage::MemoryStore;
//!
//! let store = FaultyStore::new(MemoryStore::new());
//! store.fail_commits(true);
//! assert!(store.commit(batch).is_err());
//! ```

mod faulty;

pub use faulty::FaultyStore;
