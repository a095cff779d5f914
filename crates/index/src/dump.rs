//! Row dumps
//!
//! Lazy, ordered, finite sequences of decoded rows. Each call opens its own
//! store snapshot, so a dump never observes a half-applied commit and calling
//! it again starts over against the latest state.

use std::sync::Arc;

use strata_core::{IndexError, Result};
use strata_storage::{KvIterator, KvSnapshot, KvStore};

use crate::index::Index;
use crate::rows::{stored_doc_prefix, Row, RowKind};

/// Lazy sequence of decoded rows
pub type RowIter = Box<dyn Iterator<Item = Result<Row>> + Send>;

fn decode_all(iter: KvIterator) -> RowIter {
    Box::new(iter.map(|item| {
        let (key, value) = item.map_err(IndexError::StoreRead)?;
        Row::decode(&key, &value)
    }))
}

/// Rows of one document: its term keys first, then its stored range
struct DocRowIter {
    snapshot: Arc<dyn KvSnapshot>,
    term_keys: std::vec::IntoIter<Vec<u8>>,
    stored: Option<KvIterator>,
    id: Vec<u8>,
}

impl Iterator for DocRowIter {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(key) = self.term_keys.next() {
            return Some(match self.snapshot.get(&key) {
                Ok(Some(value)) => Row::decode(&key, &value),
                Ok(None) => Err(IndexError::corrupt(
                    "term",
                    "row key directory refers to a missing row",
                )),
                Err(e) => Err(IndexError::StoreRead(e)),
            });
        }
        if self.stored.is_none() {
            match self.snapshot.scan_prefix(&stored_doc_prefix(&self.id)) {
                Ok(iter) => self.stored = Some(iter),
                Err(e) => {
                    // Yield the error once, then end
                    self.stored = Some(Box::new(std::iter::empty()));
                    return Some(Err(IndexError::StoreRead(e)));
                }
            }
        }
        let (key, value) = match self.stored.as_mut()?.next()? {
            Ok(pair) => pair,
            Err(e) => return Some(Err(IndexError::StoreRead(e))),
        };
        Some(Row::decode(&key, &value))
    }
}

impl Index {
    /// Every row in key order: version, fields, dictionary, terms, stored
    pub fn dump_all(&self) -> Result<RowIter> {
        let iter = self.store.iter_from(&[]).map_err(IndexError::StoreRead)?;
        Ok(decode_all(iter))
    }

    /// Every term and stored row of one document, in key order
    ///
    /// Empty if the document is not live.
    pub fn dump_doc(&self, id: impl AsRef<[u8]>) -> Result<RowIter> {
        let id = id.as_ref();
        // Keys and snapshot are captured together, so a concurrent update of
        // this document cannot slip in between them
        let (snapshot, term_keys) = self.locks.with_doc(id, || {
            self.store
                .snapshot()
                .map(|snapshot| (snapshot, self.directory.get(id)))
                .map_err(IndexError::StoreRead)
        })?;
        Ok(Box::new(DocRowIter {
            snapshot,
            term_keys: term_keys.into_iter(),
            stored: None,
            id: id.to_vec(),
        }))
    }

    /// Every Field row, in field index order
    pub fn dump_fields(&self) -> Result<RowIter> {
        let iter = self
            .store
            .scan_prefix(&RowKind::Field.prefix())
            .map_err(IndexError::StoreRead)?;
        Ok(decode_all(iter))
    }
}
