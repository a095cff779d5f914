//! Row key directory
//!
//! Term rows are keyed by (field, term, doc), so the rows of one document are
//! scattered across the term range. The directory remembers, per live
//! document, the sorted keys of its term rows. It is derived state: rebuilt
//! from one scan at open and replaced after every successful commit.

use std::collections::BTreeMap;

use dashmap::DashMap;
use strata_core::{IndexError, Result};
use strata_storage::KvStore;

use crate::rows::{decode_term_key, RowKind};

/// doc id -> sorted term row keys
#[derive(Debug, Default)]
pub struct RowDirectory {
    docs: DashMap<Vec<u8>, Vec<Vec<u8>>>,
}

impl RowDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from every term row in the store
    pub fn rebuild(store: &dyn KvStore) -> Result<Self> {
        let mut docs: BTreeMap<Vec<u8>, Vec<Vec<u8>>> = BTreeMap::new();
        for item in store
            .scan_prefix(&RowKind::TermFrequency.prefix())
            .map_err(IndexError::StoreRead)?
        {
            let (key, _) = item.map_err(IndexError::StoreRead)?;
            let (_, _, doc_id) = decode_term_key(&key)?;
            docs.entry(doc_id).or_default().push(key);
        }
        let directory = Self::new();
        for (doc_id, mut keys) in docs {
            keys.sort();
            directory.docs.insert(doc_id, keys);
        }
        Ok(directory)
    }

    /// Term row keys of `id`, empty if the document is not live
    pub fn get(&self, id: &[u8]) -> Vec<Vec<u8>> {
        self.docs.get(id).map(|keys| keys.clone()).unwrap_or_default()
    }

    /// Record the keys a document owns after a commit
    ///
    /// An empty key list removes the document.
    pub fn replace(&self, id: &[u8], keys: Vec<Vec<u8>>) {
        if keys.is_empty() {
            self.docs.remove(id);
        } else {
            self.docs.insert(id.to_vec(), keys);
        }
    }

    /// Whether the document is live
    pub fn contains(&self, id: &[u8]) -> bool {
        self.docs.contains_key(id)
    }

    /// Number of live documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether no document is live
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
