//! Field name interning
//!
//! Maps field names to dense `u16` indices and back. Indices are assigned on
//! first sight, persisted as Field rows before anything references them, and
//! never reused. Lookups take a read lock; only allocation of a new index
//! takes the write lock.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use strata_core::{IndexError, Result};
use strata_storage::KvStore;
use tracing::debug;

use crate::rows::{field_key, Row, RowKind};

/// Highest number of distinct fields an index can hold
pub const MAX_FIELDS: usize = u16::MAX as usize + 1;

#[derive(Debug, Default)]
struct Inner {
    by_name: FxHashMap<String, u16>,
    names: Vec<String>,
}

/// Bidirectional field name <-> index map backed by Field rows
#[derive(Debug, Default)]
pub struct FieldCache {
    inner: RwLock<Inner>,
}

impl FieldCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every Field row from the store
    ///
    /// Fails with `CorruptRow` if indices are not dense from zero.
    pub fn load(store: &dyn KvStore) -> Result<Self> {
        let mut inner = Inner::default();
        for item in store
            .scan_prefix(&RowKind::Field.prefix())
            .map_err(IndexError::StoreRead)?
        {
            let (key, value) = item.map_err(IndexError::StoreRead)?;
            let row = match Row::decode(&key, &value)? {
                Row::Field(row) => row,
                other => {
                    return Err(IndexError::corrupt(
                        "field",
                        format!("unexpected {} row in field range", other.kind().name()),
                    ))
                }
            };
            if row.index as usize != inner.names.len() {
                return Err(IndexError::corrupt(
                    "field",
                    format!(
                        "field index {} found where {} was expected",
                        row.index,
                        inner.names.len()
                    ),
                ));
            }
            if inner.by_name.insert(row.name.clone(), row.index).is_some() {
                return Err(IndexError::corrupt(
                    "field",
                    format!("field name '{}' registered twice", row.name),
                ));
            }
            inner.names.push(row.name);
        }
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Index of `name`, assigning and persisting a new one if unseen
    pub fn ensure(&self, name: &str, store: &dyn KvStore) -> Result<u16> {
        // Fast path: already assigned
        if let Some(&index) = self.inner.read().by_name.get(name) {
            return Ok(index);
        }

        let mut inner = self.inner.write();
        // Double-check after acquiring write lock
        if let Some(&index) = inner.by_name.get(name) {
            return Ok(index);
        }
        if inner.names.len() >= MAX_FIELDS {
            return Err(IndexError::invalid_input(format!(
                "field limit of {} reached, cannot add '{}'",
                MAX_FIELDS, name
            )));
        }
        let index = inner.names.len() as u16;
        store
            .set(&field_key(index), name.as_bytes())
            .map_err(IndexError::StoreWrite)?;
        inner.by_name.insert(name.to_string(), index);
        inner.names.push(name.to_string());
        debug!(target: "strata::index", field = name, index, "Registered field");
        Ok(index)
    }

    /// Index of a known field
    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Name of a known field index
    pub fn name_of(&self, index: u16) -> Option<String> {
        self.inner.read().names.get(index as usize).cloned()
    }

    /// All field names in index order
    pub fn names(&self) -> Vec<String> {
        self.inner.read().names.clone()
    }

    /// Number of registered fields
    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    /// Whether no field is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
