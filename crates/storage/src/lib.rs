//! Storage layer for the Strata row index
//!
//! This crate defines the ordered key-value contract the index writes to and
//! ships one implementation of it:
//! - `KvStore` / `KvSnapshot`: get/set/delete, atomic batches, lazy ordered
//!   iteration over consistent snapshots
//! - `MemoryStore`: BTreeMap-based store with copy-on-write snapshots
//! - `testing::FaultyStore`: failure injection for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod kv;
pub mod memory;
pub mod testing;

pub use kv::{bounded_by_prefix, BatchOp, KvIterator, KvPair, KvSnapshot, KvStore, WriteBatch};
pub use memory::{MemorySnapshot, MemoryStore};
