//! Point lookups over committed rows
//!
//! Every call reads from a fresh store snapshot. Dictionary counts reflect
//! only flushed deltas; drain first for an exact view.

use strata_core::{Document, Field, IndexError, Result};
use strata_storage::{KvIterator, KvSnapshot, KvStore};

use crate::index::Index;
use crate::rows::{
    dictionary_field_prefix, dictionary_key, stored_doc_prefix, term_key, DictionaryRow, Row,
    StoredRow, TermFrequencyRow,
};

/// Lazy `(term, count)` sequence of one field's dictionary
pub struct FieldDictIter {
    inner: Option<KvIterator>,
}

impl Iterator for FieldDictIter {
    type Item = Result<(Vec<u8>, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.as_mut()?.next()?;
        Some(item.map_err(IndexError::StoreRead).and_then(|(key, value)| {
            match Row::decode(&key, &value)? {
                Row::Dictionary(row) => Ok((row.term, row.count)),
                other => Err(IndexError::corrupt(
                    "dictionary",
                    format!("unexpected {} row in dictionary range", other.kind().name()),
                )),
            }
        }))
    }
}

impl Index {
    /// All field names, in field index order
    pub fn fields(&self) -> Vec<String> {
        self.fields.names()
    }

    /// Index of a field name, if it was ever indexed
    pub fn field_index(&self, name: &str) -> Option<u16> {
        self.fields.index_of(name)
    }

    /// Whether a document is live
    pub fn contains(&self, id: impl AsRef<[u8]>) -> bool {
        self.directory.contains(id.as_ref())
    }

    /// The term row for `(field, term)` in one document
    pub fn term_in_doc(
        &self,
        field: &str,
        term: &[u8],
        id: impl AsRef<[u8]>,
    ) -> Result<Option<TermFrequencyRow>> {
        let field = match self.fields.index_of(field) {
            Some(field) => field,
            None => return Ok(None),
        };
        let key = term_key(field, term, id.as_ref());
        match self.store.get(&key).map_err(IndexError::StoreRead)? {
            Some(value) => match Row::decode(&key, &value)? {
                Row::TermFrequency(row) => Ok(Some(row)),
                other => Err(IndexError::corrupt(
                    "term",
                    format!("unexpected {} row under a term key", other.kind().name()),
                )),
            },
            None => Ok(None),
        }
    }

    /// Number of live documents containing `(field, term)`, 0 if none
    pub fn dictionary_count(&self, field: &str, term: &[u8]) -> Result<u64> {
        let field = match self.fields.index_of(field) {
            Some(field) => field,
            None => return Ok(0),
        };
        match self
            .store
            .get(&dictionary_key(field, term))
            .map_err(IndexError::StoreRead)?
        {
            Some(value) => DictionaryRow::decode_count(&value),
            None => Ok(0),
        }
    }

    /// Every `(term, count)` of one field, in term order
    pub fn field_dict(&self, field: &str) -> Result<FieldDictIter> {
        let inner = match self.fields.index_of(field) {
            Some(field) => Some(
                self.store
                    .scan_prefix(&dictionary_field_prefix(field))
                    .map_err(IndexError::StoreRead)?,
            ),
            None => None,
        };
        Ok(FieldDictIter { inner })
    }

    /// Stored rows of one document, in field index order
    pub fn stored_fields(&self, id: impl AsRef<[u8]>) -> Result<Vec<StoredRow>> {
        let snapshot = self.store.snapshot().map_err(IndexError::StoreRead)?;
        read_stored(&*snapshot, id.as_ref())
    }

    /// Rebuild a document from its stored fields
    ///
    /// Returns `None` if the document is not live. Fields that were indexed
    /// but not stored cannot be recovered and are absent.
    pub fn document(&self, id: impl AsRef<[u8]>) -> Result<Option<Document>> {
        let id = id.as_ref();
        if !self.directory.contains(id) {
            return Ok(None);
        }
        let mut doc = Document::new(id);
        for row in self.stored_fields(id)? {
            let name = self.fields.name_of(row.field).ok_or_else(|| {
                IndexError::corrupt(
                    "stored",
                    format!("stored row refers to unknown field {}", row.field),
                )
            })?;
            doc.add_field(Field::from_stored(name, row.kind, row.value)?);
        }
        Ok(Some(doc))
    }
}

fn read_stored(snapshot: &dyn KvSnapshot, id: &[u8]) -> Result<Vec<StoredRow>> {
    let mut out = Vec::new();
    for item in snapshot
        .scan_prefix(&stored_doc_prefix(id))
        .map_err(IndexError::StoreRead)?
    {
        let (key, value) = item.map_err(IndexError::StoreRead)?;
        match Row::decode(&key, &value)? {
            Row::Stored(row) => out.push(row),
            other => {
                return Err(IndexError::corrupt(
                    "stored",
                    format!("unexpected {} row in stored range", other.kind().name()),
                ))
            }
        }
    }
    Ok(out)
}
