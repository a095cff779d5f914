//! Document model
//!
//! A [`Document`] is an opaque caller-supplied id plus an ordered list of
//! typed [`Field`]s. Every field carries its raw value bytes and the
//! [`IndexingOptions`] that decide which rows it produces:
//!
//! - `index`: term rows (analyzed tokens or numeric precision terms)
//! - `store`: one stored row holding the raw value
//! - `term_vectors`: positions and offsets inside the term rows
//!
//! Raw value encodings:
//!
//! | Kind        | Raw bytes                                   |
//! |-------------|---------------------------------------------|
//! | `Text`      | UTF-8 text (any bytes are accepted)         |
//! | `Numeric`   | `f64` bits, big-endian                      |
//! | `DateTime`  | nanoseconds since the epoch, `i64` BE       |
//! | `Composite` | empty; tokens come from the included fields |

use crate::error::{IndexError, Result};
use crate::numeric;
use chrono::{DateTime, Utc};

/// Name of the automatic id field
pub const ID_FIELD: &str = "_id";

/// Field type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Analyzed text
    Text,
    /// 64-bit float, indexed with precision terms
    Numeric,
    /// Timestamp, indexed with precision terms
    DateTime,
    /// Aggregate of other fields' tokens
    Composite,
}

impl FieldKind {
    /// Single-byte tag used in stored rows
    pub fn as_byte(self) -> u8 {
        match self {
            FieldKind::Text => b't',
            FieldKind::Numeric => b'n',
            FieldKind::DateTime => b'd',
            FieldKind::Composite => b'c',
        }
    }

    /// Parse a stored-row tag byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b't' => Some(FieldKind::Text),
            b'n' => Some(FieldKind::Numeric),
            b'd' => Some(FieldKind::DateTime),
            b'c' => Some(FieldKind::Composite),
            _ => None,
        }
    }

    /// Whether values of this kind are shredded into precision terms
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Numeric | FieldKind::DateTime)
    }
}

/// Per-field indexing flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexingOptions {
    /// Produce term rows for this field
    pub index: bool,
    /// Produce a stored row for this field
    pub store: bool,
    /// Record positions and offsets in term rows
    pub term_vectors: bool,
}

impl IndexingOptions {
    /// Neither indexed nor stored
    pub const NONE: Self = Self::new(false, false, false);
    /// Indexed only
    pub const INDEX: Self = Self::new(true, false, false);
    /// Stored only
    pub const STORE: Self = Self::new(false, true, false);
    /// Indexed and stored
    pub const INDEX_AND_STORE: Self = Self::new(true, true, false);

    /// Build options from flags
    pub const fn new(index: bool, store: bool, term_vectors: bool) -> Self {
        Self {
            index,
            store,
            term_vectors,
        }
    }

    /// Same options with term vectors enabled
    pub const fn with_term_vectors(mut self) -> Self {
        self.term_vectors = true;
        self
    }
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self::INDEX_AND_STORE
    }
}

/// Which fields a composite field aggregates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeSpec {
    /// If set, only these fields are included
    pub include: Option<Vec<String>>,
    /// Fields never included
    pub exclude: Vec<String>,
}

impl CompositeSpec {
    /// Whether tokens of `field` flow into this composite
    pub fn includes(&self, field: &str) -> bool {
        if field == ID_FIELD || self.exclude.iter().any(|f| f == field) {
            return false;
        }
        match &self.include {
            Some(include) => include.iter().any(|f| f == field),
            None => true,
        }
    }
}

/// A typed document field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    kind: FieldKind,
    value: Vec<u8>,
    options: IndexingOptions,
    composite: Option<CompositeSpec>,
}

impl Field {
    /// Text field with default options (indexed and stored)
    pub fn text(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
            value: value.into(),
            options: IndexingOptions::default(),
            composite: None,
        }
    }

    /// Numeric field with default options
    pub fn numeric(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Numeric,
            value: value.to_bits().to_be_bytes().to_vec(),
            options: IndexingOptions::default(),
            composite: None,
        }
    }

    /// Datetime field with default options
    ///
    /// Fails if the instant is outside the nanosecond-representable range.
    pub fn datetime(name: impl Into<String>, value: DateTime<Utc>) -> Result<Self> {
        let nanos = numeric::datetime_to_i64(&value)?;
        Ok(Self {
            name: name.into(),
            kind: FieldKind::DateTime,
            value: nanos.to_be_bytes().to_vec(),
            options: IndexingOptions::default(),
            composite: None,
        })
    }

    /// Composite field over every other field
    pub fn composite(name: impl Into<String>) -> Self {
        Self::composite_with(name, CompositeSpec::default())
    }

    /// Composite field with explicit include/exclude lists
    pub fn composite_with(name: impl Into<String>, spec: CompositeSpec) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Composite,
            value: Vec::new(),
            options: IndexingOptions::INDEX,
            composite: Some(spec),
        }
    }

    /// Rebuild a field from a stored row
    pub fn from_stored(name: impl Into<String>, kind: FieldKind, value: Vec<u8>) -> Result<Self> {
        let expected = match kind {
            FieldKind::Numeric | FieldKind::DateTime => Some(8),
            _ => None,
        };
        if let Some(len) = expected {
            if value.len() != len {
                return Err(IndexError::corrupt(
                    "stored",
                    format!("{:?} value must be {} bytes, got {}", kind, len, value.len()),
                ));
            }
        }
        Ok(Self {
            name: name.into(),
            kind,
            value,
            options: IndexingOptions::STORE,
            composite: None,
        })
    }

    /// Replace the indexing options
    ///
    /// Composite fields are never stored; a store flag is ignored for them.
    pub fn with_options(mut self, options: IndexingOptions) -> Self {
        self.options = options;
        if self.kind == FieldKind::Composite {
            self.options.store = false;
        }
        self
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field kind
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Raw value bytes
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Indexing options
    pub fn options(&self) -> IndexingOptions {
        self.options
    }

    /// Composite include/exclude lists, for composite fields
    pub fn composite_spec(&self) -> Option<&CompositeSpec> {
        self.composite.as_ref()
    }

    /// Text value, if this is a UTF-8 text field
    pub fn text_value(&self) -> Option<&str> {
        match self.kind {
            FieldKind::Text => std::str::from_utf8(&self.value).ok(),
            _ => None,
        }
    }

    /// Numeric value, if this is a numeric field
    pub fn numeric_value(&self) -> Option<f64> {
        match self.kind {
            FieldKind::Numeric => self.fixed8().map(|raw| f64::from_bits(u64::from_be_bytes(raw))),
            _ => None,
        }
    }

    /// Datetime value, if this is a datetime field
    pub fn datetime_value(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            FieldKind::DateTime => self
                .fixed8()
                .map(|raw| numeric::i64_to_datetime(i64::from_be_bytes(raw))),
            _ => None,
        }
    }

    /// Order-preserving integer form used for precision terms
    pub fn sortable_i64(&self) -> Option<i64> {
        match self.kind {
            FieldKind::Numeric => self.numeric_value().map(numeric::f64_to_sortable_i64),
            FieldKind::DateTime => self.fixed8().map(i64::from_be_bytes),
            _ => None,
        }
    }

    fn fixed8(&self) -> Option<[u8; 8]> {
        self.value.as_slice().try_into().ok()
    }
}

/// A document: an id plus ordered fields
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: Vec<u8>,
    fields: Vec<Field>,
}

impl Document {
    /// Create an empty document
    pub fn new(id: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field
    pub fn add_field(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    /// Append a field, builder style
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Document id bytes
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// Fields in insertion order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// First field with the given name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reject documents the row builder cannot represent
    ///
    /// Ids must be non-empty, field names non-empty, unique and not the
    /// reserved id field name.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(IndexError::invalid_input("document id cannot be empty"));
        }
        let mut seen = std::collections::HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(IndexError::invalid_input("field name cannot be empty"));
            }
            if field.name == ID_FIELD {
                return Err(IndexError::invalid_input(format!(
                    "field name '{}' is reserved",
                    ID_FIELD
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(IndexError::invalid_input(format!(
                    "duplicate field '{}' in document",
                    field.name
                )));
            }
        }
        Ok(())
    }
}
