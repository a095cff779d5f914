//! Document row builder
//!
//! Turns an analyzed document into the complete set of rows it owns: one
//! term row per distinct (field, term) and one stored row per stored field.
//! Field indices are resolved by the caller through the field cache before
//! building, so the builder itself never touches the store.

use std::collections::{BTreeMap, BTreeSet};

use strata_core::{Document, FieldKind, IndexError, Result};

use crate::analysis::AnalyzedDocument;
use crate::dictionary::DictionaryKey;
use crate::rows::{Row, StoredRow, TermFrequencyRow, TermVector};

/// Every row a document owns, plus the dictionary keys it touches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocRows {
    /// Document id
    pub id: Vec<u8>,
    /// Encoded rows, key -> value
    pub rows: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Distinct (field, term) pairs with a term row, `_id` excluded
    pub terms: BTreeSet<DictionaryKey>,
}

impl DocRows {
    /// Empty row set for `id`, used for documents that do not exist
    pub fn empty(id: &[u8]) -> Self {
        Self {
            id: id.to_vec(),
            ..Self::default()
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the document owns no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn insert(&mut self, row: Row) {
        let (key, value) = row.to_pair();
        self.rows.insert(key, value);
    }
}

/// Length normalization factor for a field of `length` tokens
pub fn length_norm(length: u64) -> f32 {
    if length == 0 {
        return 0.0;
    }
    1.0 / (length as f32).sqrt()
}

/// Build the row set of `doc`
///
/// `indices[i]` is the field index of `analyzed.fields[i]`.
pub fn build_rows(doc: &Document, analyzed: &AnalyzedDocument, indices: &[u16]) -> Result<DocRows> {
    if indices.len() != analyzed.fields.len() || analyzed.fields.len() != doc.len() + 1 {
        return Err(IndexError::invalid_input(format!(
            "field index count {} does not match {} analyzed fields",
            indices.len(),
            analyzed.fields.len()
        )));
    }

    let mut out = DocRows::empty(doc.id());

    for (ordinal, field) in analyzed.fields.iter().enumerate() {
        let index = indices[ordinal];
        let norm = length_norm(field.length);
        for (term, freq) in &field.frequencies {
            let vectors = if field.options.term_vectors {
                freq.locations
                    .iter()
                    .map(|loc| TermVector {
                        field: indices[loc.source],
                        position: loc.position,
                        start: loc.start,
                        end: loc.end,
                    })
                    .collect()
            } else {
                Vec::new()
            };
            out.insert(Row::TermFrequency(TermFrequencyRow {
                field: index,
                term: term.clone(),
                doc_id: doc.id().to_vec(),
                freq: freq.frequency,
                norm,
                vectors,
            }));
            // `_id` terms are unique per document and never counted
            if ordinal != 0 {
                out.terms.insert(DictionaryKey::new(index, term.clone()));
            }
        }
    }

    for (i, field) in doc.fields().iter().enumerate() {
        if !field.options().store || field.kind() == FieldKind::Composite {
            continue;
        }
        out.insert(Row::Stored(StoredRow {
            doc_id: doc.id().to_vec(),
            field: indices[i + 1],
            kind: field.kind(),
            value: field.value().to_vec(),
        }));
    }

    Ok(out)
}
