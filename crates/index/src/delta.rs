//! Row set difference
//!
//! An update never rewrites a document wholesale. The old and new row sets
//! are diffed: keys only in the old set are deleted, keys only in the new set
//! or with a changed value are written, and identical rows are left alone.

use std::collections::{BTreeMap, BTreeSet};

use strata_storage::WriteBatch;

use crate::builder::DocRows;
use crate::dictionary::DictionaryKey;
use crate::rows::RowKind;

/// Minimal set of writes turning one row set into another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowDelta {
    /// Keys to delete
    pub removals: Vec<Vec<u8>>,
    /// Keys to insert or overwrite
    pub upserts: Vec<(Vec<u8>, Vec<u8>)>,
    /// Rows present and identical in both sets
    pub unchanged: usize,
}

impl RowDelta {
    /// Diff two row maps
    pub fn compute(old: &BTreeMap<Vec<u8>, Vec<u8>>, new: &BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        let mut delta = RowDelta::default();
        for key in old.keys() {
            if !new.contains_key(key) {
                delta.removals.push(key.clone());
            }
        }
        for (key, value) in new {
            match old.get(key) {
                Some(existing) if existing == value => delta.unchanged += 1,
                _ => delta.upserts.push((key.clone(), value.clone())),
            }
        }
        delta
    }

    /// Stage every write into `batch`, removals first
    pub fn write_into(&self, batch: &mut WriteBatch) {
        for key in &self.removals {
            batch.delete(key.clone());
        }
        for (key, value) in &self.upserts {
            batch.set(key.clone(), value.clone());
        }
    }

    /// Whether nothing needs to be written
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.upserts.is_empty()
    }

    /// Number of writes
    pub fn len(&self) -> usize {
        self.removals.len() + self.upserts.len()
    }
}

/// Dictionary deltas implied by replacing `old` with `new`
///
/// `+1` for every (field, term) only in `new`, `-1` for every one only in
/// `old`. Terms present in both contribute nothing.
pub fn dictionary_deltas(
    old: &BTreeSet<DictionaryKey>,
    new: &BTreeSet<DictionaryKey>,
) -> Vec<(DictionaryKey, i64)> {
    let added = new.difference(old).map(|k| (k.clone(), 1));
    let removed = old.difference(new).map(|k| (k.clone(), -1));
    added.chain(removed).collect()
}

/// Row and dictionary changes for one document
#[derive(Debug, Clone, Default)]
pub struct DocumentPlan {
    /// Document id
    pub id: Vec<u8>,
    /// Row writes
    pub delta: RowDelta,
    /// Dictionary deltas to enqueue after commit
    pub dictionary: Vec<(DictionaryKey, i64)>,
    /// Whether the document existed before
    pub was_live: bool,
    /// Whether the document exists afterwards
    pub is_live: bool,
    /// Term keys the document owns afterwards, sorted
    pub term_keys: Vec<Vec<u8>>,
}

impl DocumentPlan {
    /// Plan replacing `old` with `new`
    pub fn new(old: &DocRows, new: &DocRows) -> Self {
        let term_tag = RowKind::TermFrequency.tag();
        let term_keys = new
            .rows
            .keys()
            .filter(|k| k.first() == Some(&term_tag))
            .cloned()
            .collect();
        Self {
            id: new.id.clone(),
            delta: RowDelta::compute(&old.rows, &new.rows),
            dictionary: dictionary_deltas(&old.terms, &new.terms),
            was_live: !old.is_empty(),
            is_live: !new.is_empty(),
            term_keys,
        }
    }

    /// Change in live document count
    pub fn doc_count_delta(&self) -> i64 {
        match (self.was_live, self.is_live) {
            (false, true) => 1,
            (true, false) => -1,
            _ => 0,
        }
    }
}
