//! Multi-document batches
//!
//! A [`Batch`] collects updates and deletes for many documents and is
//! committed by [`Index::batch`](crate::Index::batch) as one atomic store
//! write. Only the last operation staged for an id counts.

use std::collections::BTreeMap;

use strata_core::Document;

/// Staged updates and deletes, keyed by document id
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: BTreeMap<Vec<u8>, Option<Document>>,
}

impl Batch {
    /// Empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an update, replacing anything staged for the same id
    pub fn update(&mut self, doc: Document) -> &mut Self {
        self.ops.insert(doc.id().to_vec(), Some(doc));
        self
    }

    /// Stage a delete, replacing anything staged for the same id
    pub fn delete(&mut self, id: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.insert(id.into(), None);
        self
    }

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is staged
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Ids in sorted order
    pub fn ids(&self) -> Vec<Vec<u8>> {
        self.ops.keys().cloned().collect()
    }

    /// Consume into `(id, Some(doc) | None)` in id order
    pub fn into_ops(self) -> impl Iterator<Item = (Vec<u8>, Option<Document>)> {
        self.ops.into_iter()
    }
}
