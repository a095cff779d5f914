//! Strata row index - document-to-row indexing over an ordered key-value store
//!
//! Documents go in; rows of five kinds come out: a version row, one row per
//! field name, one reference-counted dictionary row per (field, term), one
//! term row per (field, term, document) and one stored row per stored field.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use stratadb_index::{Document, Field, Index, IndexConfig, MemoryStore};
//!
//! let index = Index::open(Arc::new(MemoryStore::new()), IndexConfig::default())?;
//! index.update(Document::new("1").with_field(Field::text("name", "test")))?;
//! assert_eq!(index.doc_count(), 1);
//!
//! for row in index.dump_doc("1")? {
//!     println!("{:?}", row?);
//! }
//! ```
//!
//! # Architecture
//!
//! - `strata-core`: documents, numeric shredding, errors, configuration
//! - `strata-storage`: the `KvStore` contract and an in-memory store
//! - `strata-index`: row schema, analysis, dictionary updater and [`Index`]

pub use strata_core::{
    CompositeSpec, DictionaryConfig, Document, Field, FieldKind, IndexConfig, IndexError,
    IndexingOptions, Result, StoreError,
};
pub use strata_index::*;
pub use strata_storage::{KvSnapshot, KvStore, MemoryStore, WriteBatch};
