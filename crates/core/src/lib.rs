//! Core types for the Strata row index
//!
//! This crate defines the foundational types shared by the storage and index
//! crates:
//! - Error: `StoreError` and `IndexError` hierarchies
//! - Document: documents, typed fields and indexing options
//! - Numeric: precision-step shredding of numeric and temporal values
//! - Config: `IndexConfig` loaded from `index.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod document;
pub mod error;
pub mod numeric;

pub use config::{DictionaryConfig, IndexConfig, CONFIG_FILE_NAME};
pub use document::{CompositeSpec, Document, Field, FieldKind, IndexingOptions, ID_FIELD};
pub use error::{IndexError, Result, StoreError, StoreResult};
pub use numeric::{PrecisionTerm, DEFAULT_PRECISION_STEP};
