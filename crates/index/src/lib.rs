//! Document-to-row indexing for the Strata row index
//!
//! This crate turns documents into rows of an ordered key-value store and
//! keeps those rows consistent under concurrent updates and deletes:
//! - Rows: the binary key/value schema (version, field, dictionary, term, stored)
//! - Analysis: tokenization and per-field term frequencies on a worker pool
//! - Builder / delta: complete row sets and their symmetric difference
//! - Dictionary: asynchronous, batched per-term document counts
//! - Index: update, delete, batch, lookups and row dumps
//!
//! Only [`Index`] mutates rows; everything else is a pure function or a
//! component owned by it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod analysis_queue;
pub mod batch;
pub mod builder;
pub mod delta;
pub mod dictionary;
pub mod directory;
pub mod doc_locks;
pub mod dump;
pub mod field_cache;
pub mod index;
pub mod reader;
pub mod rows;
pub mod stats;

pub use analysis::{
    analyze_document, AnalyzedDocument, AnalyzedField, Analyzer, KeywordAnalyzer,
    StandardAnalyzer, Token,
};
pub use batch::Batch;
pub use dictionary::{DictionaryKey, DictionaryStats};
pub use dump::RowIter;
pub use index::Index;
pub use reader::FieldDictIter;
pub use rows::{
    DictionaryRow, FieldRow, Row, RowKind, StoredRow, TermFrequencyRow, TermVector, VersionRow,
    SCHEMA_VERSION,
};
pub use stats::IndexStats;
