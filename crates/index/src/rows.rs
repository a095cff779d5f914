//! Row codec
//!
//! Every piece of index state is one of five row kinds stored in a single
//! ordered key space. The first key byte is the kind tag:
//!
//! ```text
//! Version      0x00                                   -> u8 schema version
//! Field        0x01 | field u16                       -> field name (UTF-8)
//! Dictionary   0x02 | field u16 | term                -> u64 doc count
//! TermFreq     0x03 | field u16 | esc(term) | doc id  -> freq, norm, vectors
//! Stored       0x04 | esc(doc id) | field u16         -> kind byte, raw value
//! ```
//!
//! All integers are big-endian. `esc(x)` is an order-preserving escape
//! (`0x00` -> `0x00 0xFF`, terminated by `0x00 0x01`) used for components that
//! are followed by more key bytes. It is prefix-free, so a term prefix never
//! matches a longer term, and it keeps terms in bytewise order.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use strata_core::{FieldKind, IndexError, Result};

/// Schema version written into the version row
pub const SCHEMA_VERSION: u8 = 1;

/// Key of the singleton version row
pub const VERSION_KEY: [u8; 1] = [RowKind::Version as u8];

const ESCAPE: u8 = 0x00;
const ESCAPED_ZERO: u8 = 0xFF;
const TERMINATOR: u8 = 0x01;

/// Row kind, doubling as the key tag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RowKind {
    /// Singleton schema version
    Version = 0x00,
    /// Field name interning
    Field = 0x01,
    /// Per-(field, term) document count
    Dictionary = 0x02,
    /// Term occurrence in one document
    TermFrequency = 0x03,
    /// Stored field value
    Stored = 0x04,
}

impl RowKind {
    /// Tag byte
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Parse a tag byte
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(RowKind::Version),
            0x01 => Some(RowKind::Field),
            0x02 => Some(RowKind::Dictionary),
            0x03 => Some(RowKind::TermFrequency),
            0x04 => Some(RowKind::Stored),
            _ => None,
        }
    }

    /// Kind of the row stored under `key`
    pub fn of_key(key: &[u8]) -> Result<Self> {
        key.first()
            .copied()
            .and_then(Self::from_tag)
            .ok_or_else(|| IndexError::corrupt("unknown", format!("bad key tag in {:?}", key)))
    }

    /// Short name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            RowKind::Version => "version",
            RowKind::Field => "field",
            RowKind::Dictionary => "dictionary",
            RowKind::TermFrequency => "term",
            RowKind::Stored => "stored",
        }
    }

    /// Prefix shared by every key of this kind
    pub fn prefix(self) -> [u8; 1] {
        [self.tag()]
    }
}

// ============================================================================
// Escaping
// ============================================================================

fn escape_into(out: &mut Vec<u8>, component: &[u8]) {
    for &b in component {
        out.push(b);
        if b == ESCAPE {
            out.push(ESCAPED_ZERO);
        }
    }
    out.push(ESCAPE);
    out.push(TERMINATOR);
}

fn unescape<'a>(kind: RowKind, input: &'a [u8]) -> Result<(Vec<u8>, &'a [u8])> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b != ESCAPE {
            out.push(b);
            i += 1;
            continue;
        }
        match input.get(i + 1) {
            Some(&ESCAPED_ZERO) => {
                out.push(ESCAPE);
                i += 2;
            }
            Some(&TERMINATOR) => return Ok((out, &input[i + 2..])),
            _ => return Err(IndexError::corrupt(kind.name(), "invalid escape sequence")),
        }
    }
    Err(IndexError::corrupt(kind.name(), "unterminated key component"))
}

fn split_field(kind: RowKind, input: &[u8]) -> Result<(u16, &[u8])> {
    if input.len() < 2 {
        return Err(IndexError::corrupt(kind.name(), "truncated field index"));
    }
    let field = u16::from_be_bytes([input[0], input[1]]);
    Ok((field, &input[2..]))
}

fn expect_kind(key: &[u8], kind: RowKind) -> Result<&[u8]> {
    match key.split_first() {
        Some((&tag, rest)) if tag == kind.tag() => Ok(rest),
        _ => Err(IndexError::corrupt(
            kind.name(),
            format!("key does not carry the {} tag", kind.name()),
        )),
    }
}

fn io_corrupt(kind: RowKind) -> impl Fn(std::io::Error) -> IndexError {
    move |e| IndexError::corrupt(kind.name(), format!("truncated value: {}", e))
}

fn expect_consumed(kind: RowKind, cursor: &Cursor<&[u8]>) -> Result<()> {
    if (cursor.position() as usize) != cursor.get_ref().len() {
        return Err(IndexError::corrupt(kind.name(), "trailing bytes in value"));
    }
    Ok(())
}

// ============================================================================
// Key builders
// ============================================================================

/// Key of the field row for `field`
pub fn field_key(field: u16) -> Vec<u8> {
    let mut key = Vec::with_capacity(3);
    key.push(RowKind::Field.tag());
    key.extend_from_slice(&field.to_be_bytes());
    key
}

/// Key of the dictionary row for `(field, term)`
pub fn dictionary_key(field: u16, term: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(3 + term.len());
    key.push(RowKind::Dictionary.tag());
    key.extend_from_slice(&field.to_be_bytes());
    key.extend_from_slice(term);
    key
}

/// Prefix of every dictionary row of one field
pub fn dictionary_field_prefix(field: u16) -> Vec<u8> {
    dictionary_key(field, &[])
}

/// Prefix of every term row for `(field, term)`, across all documents
pub fn term_prefix(field: u16, term: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(5 + term.len());
    key.push(RowKind::TermFrequency.tag());
    key.extend_from_slice(&field.to_be_bytes());
    escape_into(&mut key, term);
    key
}

/// Key of the term row for `(field, term, doc)`
pub fn term_key(field: u16, term: &[u8], doc_id: &[u8]) -> Vec<u8> {
    let mut key = term_prefix(field, term);
    key.extend_from_slice(doc_id);
    key
}

/// Decode a term row key into `(field, term, doc id)`
pub fn decode_term_key(key: &[u8]) -> Result<(u16, Vec<u8>, Vec<u8>)> {
    let kind = RowKind::TermFrequency;
    let rest = expect_kind(key, kind)?;
    let (field, rest) = split_field(kind, rest)?;
    let (term, doc_id) = unescape(kind, rest)?;
    if doc_id.is_empty() {
        return Err(IndexError::corrupt(kind.name(), "missing document id"));
    }
    Ok((field, term, doc_id.to_vec()))
}

/// Prefix of every stored row of one document
pub fn stored_doc_prefix(doc_id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(3 + doc_id.len());
    key.push(RowKind::Stored.tag());
    escape_into(&mut key, doc_id);
    key
}

/// Key of the stored row for `(doc, field)`
pub fn stored_key(doc_id: &[u8], field: u16) -> Vec<u8> {
    let mut key = stored_doc_prefix(doc_id);
    key.extend_from_slice(&field.to_be_bytes());
    key
}

// ============================================================================
// Row types
// ============================================================================

/// Singleton schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRow {
    /// Schema version
    pub version: u8,
}

/// Field name interning entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    /// Dense field index
    pub index: u16,
    /// Field name
    pub name: String,
}

/// Number of live documents containing `(field, term)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryRow {
    /// Field index
    pub field: u16,
    /// Term bytes
    pub term: Vec<u8>,
    /// Document count, always > 0 when persisted
    pub count: u64,
}

impl DictionaryRow {
    /// Encode a count value
    pub fn encode_count(count: u64) -> Vec<u8> {
        count.to_be_bytes().to_vec()
    }

    /// Decode a count value
    pub fn decode_count(value: &[u8]) -> Result<u64> {
        let raw: [u8; 8] = value.try_into().map_err(|_| {
            IndexError::corrupt(
                RowKind::Dictionary.name(),
                format!("count must be 8 bytes, got {}", value.len()),
            )
        })?;
        Ok(u64::from_be_bytes(raw))
    }
}

/// Position and offsets of one occurrence of a term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermVector {
    /// Field the occurrence came from (differs from the row's field for
    /// composite fields)
    pub field: u16,
    /// 1-based token position
    pub position: u64,
    /// Start byte offset
    pub start: u64,
    /// End byte offset
    pub end: u64,
}

/// A term's occurrence in one document
#[derive(Debug, Clone, PartialEq)]
pub struct TermFrequencyRow {
    /// Field index
    pub field: u16,
    /// Term bytes
    pub term: Vec<u8>,
    /// Document id
    pub doc_id: Vec<u8>,
    /// Occurrences in the field
    pub freq: u64,
    /// Length normalization factor, `1 / sqrt(field length)`
    pub norm: f32,
    /// Occurrence details, empty unless term vectors were requested
    pub vectors: Vec<TermVector>,
}

impl TermFrequencyRow {
    fn encode_value(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.vectors.len() * 26);
        // Writes into a Vec cannot fail
        let _ = out.write_u64::<BigEndian>(self.freq);
        let _ = out.write_f32::<BigEndian>(self.norm);
        let _ = out.write_u32::<BigEndian>(self.vectors.len() as u32);
        for v in &self.vectors {
            let _ = out.write_u16::<BigEndian>(v.field);
            let _ = out.write_u64::<BigEndian>(v.position);
            let _ = out.write_u64::<BigEndian>(v.start);
            let _ = out.write_u64::<BigEndian>(v.end);
        }
        out
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Self> {
        let kind = RowKind::TermFrequency;
        let (field, term, doc_id) = decode_term_key(key)?;
        let mut cursor = Cursor::new(value);
        let freq = cursor.read_u64::<BigEndian>().map_err(io_corrupt(kind))?;
        let norm = cursor.read_f32::<BigEndian>().map_err(io_corrupt(kind))?;
        let count = cursor.read_u32::<BigEndian>().map_err(io_corrupt(kind))? as usize;
        // Each vector is 26 bytes; reject counts the value cannot hold
        let remaining = value.len().saturating_sub(cursor.position() as usize);
        if count > remaining / 26 {
            return Err(IndexError::corrupt(kind.name(), "vector count exceeds value"));
        }
        let mut vectors = Vec::with_capacity(count);
        for _ in 0..count {
            vectors.push(TermVector {
                field: cursor.read_u16::<BigEndian>().map_err(io_corrupt(kind))?,
                position: cursor.read_u64::<BigEndian>().map_err(io_corrupt(kind))?,
                start: cursor.read_u64::<BigEndian>().map_err(io_corrupt(kind))?,
                end: cursor.read_u64::<BigEndian>().map_err(io_corrupt(kind))?,
            });
        }
        expect_consumed(kind, &cursor)?;
        Ok(Self {
            field,
            term,
            doc_id,
            freq,
            norm,
            vectors,
        })
    }
}

/// Raw stored value of one field of one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// Document id
    pub doc_id: Vec<u8>,
    /// Field index
    pub field: u16,
    /// Field kind, needed to rebuild a typed field
    pub kind: FieldKind,
    /// Raw value bytes
    pub value: Vec<u8>,
}

impl StoredRow {
    fn decode(key: &[u8], value: &[u8]) -> Result<Self> {
        let kind = RowKind::Stored;
        let rest = expect_kind(key, kind)?;
        let (doc_id, rest) = unescape(kind, rest)?;
        if rest.len() != 2 {
            return Err(IndexError::corrupt(kind.name(), "bad field index suffix"));
        }
        let field = u16::from_be_bytes([rest[0], rest[1]]);
        let (&tag, raw) = value
            .split_first()
            .ok_or_else(|| IndexError::corrupt(kind.name(), "empty value"))?;
        let field_kind = FieldKind::from_byte(tag).ok_or_else(|| {
            IndexError::corrupt(kind.name(), format!("unknown field kind 0x{:02x}", tag))
        })?;
        Ok(Self {
            doc_id,
            field,
            kind: field_kind,
            value: raw.to_vec(),
        })
    }
}

/// Any decoded row
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// Schema version
    Version(VersionRow),
    /// Field name
    Field(FieldRow),
    /// Dictionary count
    Dictionary(DictionaryRow),
    /// Term in document
    TermFrequency(TermFrequencyRow),
    /// Stored value
    Stored(StoredRow),
}

impl Row {
    /// Kind of this row
    pub fn kind(&self) -> RowKind {
        match self {
            Row::Version(_) => RowKind::Version,
            Row::Field(_) => RowKind::Field,
            Row::Dictionary(_) => RowKind::Dictionary,
            Row::TermFrequency(_) => RowKind::TermFrequency,
            Row::Stored(_) => RowKind::Stored,
        }
    }

    /// Encoded key
    pub fn key(&self) -> Vec<u8> {
        match self {
            Row::Version(_) => VERSION_KEY.to_vec(),
            Row::Field(r) => field_key(r.index),
            Row::Dictionary(r) => dictionary_key(r.field, &r.term),
            Row::TermFrequency(r) => term_key(r.field, &r.term, &r.doc_id),
            Row::Stored(r) => stored_key(&r.doc_id, r.field),
        }
    }

    /// Encoded value
    pub fn value(&self) -> Vec<u8> {
        match self {
            Row::Version(r) => vec![r.version],
            Row::Field(r) => r.name.as_bytes().to_vec(),
            Row::Dictionary(r) => DictionaryRow::encode_count(r.count),
            Row::TermFrequency(r) => r.encode_value(),
            Row::Stored(r) => {
                let mut out = Vec::with_capacity(1 + r.value.len());
                out.push(r.kind.as_byte());
                out.extend_from_slice(&r.value);
                out
            }
        }
    }

    /// Encoded `(key, value)`
    pub fn to_pair(&self) -> (Vec<u8>, Vec<u8>) {
        (self.key(), self.value())
    }

    /// Decode a stored `(key, value)` pair
    pub fn decode(key: &[u8], value: &[u8]) -> Result<Row> {
        let kind = RowKind::of_key(key)?;
        match kind {
            RowKind::Version => {
                if key.len() != 1 || value.len() != 1 {
                    return Err(IndexError::corrupt(kind.name(), "bad version row"));
                }
                Ok(Row::Version(VersionRow { version: value[0] }))
            }
            RowKind::Field => {
                let rest = expect_kind(key, kind)?;
                let (index, rest) = split_field(kind, rest)?;
                if !rest.is_empty() {
                    return Err(IndexError::corrupt(kind.name(), "trailing key bytes"));
                }
                let name = String::from_utf8(value.to_vec())
                    .map_err(|_| IndexError::corrupt(kind.name(), "name is not UTF-8"))?;
                Ok(Row::Field(FieldRow { index, name }))
            }
            RowKind::Dictionary => {
                let rest = expect_kind(key, kind)?;
                let (field, term) = split_field(kind, rest)?;
                Ok(Row::Dictionary(DictionaryRow {
                    field,
                    term: term.to_vec(),
                    count: DictionaryRow::decode_count(value)?,
                }))
            }
            RowKind::TermFrequency => Ok(Row::TermFrequency(TermFrequencyRow::decode(key, value)?)),
            RowKind::Stored => Ok(Row::Stored(StoredRow::decode(key, value)?)),
        }
    }
}
