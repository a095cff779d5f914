//! Document analysis
//!
//! Turns a [`Document`] into per-field token frequencies:
//!
//! - `_id` becomes a single keyword token (the id bytes)
//! - indexed text fields are run through the [`Analyzer`]
//! - indexed numeric and datetime fields are shredded into precision terms
//! - composite fields aggregate the tokens of the fields they include
//!
//! Analysis is pure: it knows nothing about field indices or the store, so it
//! can run on the worker pool without touching shared state.

use std::collections::BTreeMap;

use strata_core::numeric::prefix_coded_terms;
use strata_core::{Document, FieldKind, IndexingOptions, ID_FIELD};
use unicode_segmentation::UnicodeSegmentation;

/// One token produced by an analyzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Term bytes
    pub term: Vec<u8>,
    /// 1-based position in the token stream
    pub position: u64,
    /// Start byte offset in the field value
    pub start: u64,
    /// End byte offset in the field value
    pub end: u64,
}

/// Pluggable text analysis
pub trait Analyzer: Send + Sync {
    /// Split a field value into tokens
    fn analyze(&self, kind: FieldKind, value: &[u8]) -> Vec<Token>;
}

/// UAX#29 word splitting plus lowercasing
///
/// Values that are not valid UTF-8 are indexed as a single token.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAnalyzer;

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, kind: FieldKind, value: &[u8]) -> Vec<Token> {
        let text = match std::str::from_utf8(value) {
            Ok(text) => text,
            Err(_) => return KeywordAnalyzer.analyze(kind, value),
        };
        text.unicode_word_indices()
            .enumerate()
            .map(|(i, (offset, word))| Token {
                term: word.to_lowercase().into_bytes(),
                position: i as u64 + 1,
                start: offset as u64,
                end: (offset + word.len()) as u64,
            })
            .collect()
    }
}

/// The whole value as one token; empty values produce none
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordAnalyzer;

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, _kind: FieldKind, value: &[u8]) -> Vec<Token> {
        if value.is_empty() {
            return Vec::new();
        }
        vec![Token {
            term: value.to_vec(),
            position: 1,
            start: 0,
            end: value.len() as u64,
        }]
    }
}

/// Where one occurrence of a term came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLocation {
    /// Ordinal of the source field in [`AnalyzedDocument::fields`]
    pub source: usize,
    /// 1-based position
    pub position: u64,
    /// Start byte offset
    pub start: u64,
    /// End byte offset
    pub end: u64,
}

/// Occurrences of one term in one field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenFreq {
    /// Number of occurrences
    pub frequency: u64,
    /// Every occurrence, in stream order
    pub locations: Vec<TokenLocation>,
}

/// Term -> occurrences, ordered by term bytes
pub type TokenFrequencies = BTreeMap<Vec<u8>, TokenFreq>;

/// Analysis result for one field
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedField {
    /// Field name
    pub name: String,
    /// Field kind
    pub kind: FieldKind,
    /// Indexing options the field was analyzed with
    pub options: IndexingOptions,
    /// Number of tokens, used for the length norm
    pub length: u64,
    /// Token frequencies, empty for fields that are not indexed
    pub frequencies: TokenFrequencies,
}

impl AnalyzedField {
    fn new(name: &str, kind: FieldKind, options: IndexingOptions) -> Self {
        Self {
            name: name.to_string(),
            kind,
            options,
            length: 0,
            frequencies: TokenFrequencies::new(),
        }
    }

    fn add_tokens(&mut self, source: usize, tokens: impl IntoIterator<Item = Token>) {
        for token in tokens {
            self.length += 1;
            let entry = self.frequencies.entry(token.term).or_default();
            entry.frequency += 1;
            entry.locations.push(TokenLocation {
                source,
                position: token.position,
                start: token.start,
                end: token.end,
            });
        }
    }

    fn merge_from(&mut self, other: &AnalyzedField) {
        self.length += other.length;
        for (term, freq) in &other.frequencies {
            let entry = self.frequencies.entry(term.clone()).or_default();
            entry.frequency += freq.frequency;
            entry.locations.extend_from_slice(&freq.locations);
        }
    }
}

/// Analysis result for a whole document
///
/// `fields[0]` is always `_id`; `fields[i + 1]` corresponds to the document's
/// `i`-th field.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedDocument {
    /// Document id
    pub id: Vec<u8>,
    /// Per-field results, `_id` first
    pub fields: Vec<AnalyzedField>,
}

impl AnalyzedDocument {
    /// Names of every analyzed field, in ordinal order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Analyze every field of `doc`
pub fn analyze_document(
    doc: &Document,
    analyzer: &dyn Analyzer,
    precision_step: u8,
) -> AnalyzedDocument {
    let mut fields = Vec::with_capacity(doc.len() + 1);

    let mut id = AnalyzedField::new(ID_FIELD, FieldKind::Text, IndexingOptions::INDEX);
    id.add_tokens(0, KeywordAnalyzer.analyze(FieldKind::Text, doc.id()));
    fields.push(id);

    for (i, field) in doc.fields().iter().enumerate() {
        let source = i + 1;
        let mut analyzed = AnalyzedField::new(field.name(), field.kind(), field.options());
        if field.options().index {
            match field.kind() {
                FieldKind::Text => {
                    analyzed.add_tokens(source, analyzer.analyze(field.kind(), field.value()));
                }
                FieldKind::Numeric | FieldKind::DateTime => {
                    if let Some(value) = field.sortable_i64() {
                        let tokens =
                            prefix_coded_terms(value, precision_step)
                                .into_iter()
                                .map(|p| Token {
                                    end: p.term.len() as u64,
                                    term: p.term,
                                    position: 1,
                                    start: 0,
                                });
                        analyzed.add_tokens(source, tokens);
                    }
                }
                // Filled in below, once every other field is analyzed
                FieldKind::Composite => {}
            }
        }
        fields.push(analyzed);
    }

    for (i, field) in doc.fields().iter().enumerate() {
        let spec = match field.composite_spec() {
            Some(spec) if field.options().index => spec,
            _ => continue,
        };
        let mut composite = AnalyzedField::new(field.name(), field.kind(), field.options());
        for other in &fields[1..] {
            if other.kind != FieldKind::Composite && spec.includes(&other.name) {
                composite.merge_from(other);
            }
        }
        fields[i + 1] = composite;
    }

    AnalyzedDocument {
        id: doc.id().to_vec(),
        fields,
    }
}
