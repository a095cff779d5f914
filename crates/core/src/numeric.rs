//! Numeric range encoding
//!
//! A numeric or temporal value is indexed as a ladder of terms, one per
//! precision level. Level 0 carries the full value; each following level masks
//! off `precision_step` more low-order bits. Range queries over wide intervals
//! can then match a handful of coarse terms instead of every exact value.
//!
//! # Term layout
//!
//! ```text
//! +------------------+-----------------------------------------+
//! | 0x20 + shift (1) | (value ^ SIGN_BIT) >> shift  (u64 BE, 8) |
//! +------------------+-----------------------------------------+
//! ```
//!
//! Flipping the sign bit turns two's complement order into unsigned order, and
//! fixed-width big-endian bytes make byte order equal numeric order within a
//! level. All functions here are pure.

use crate::error::{IndexError, Result};
use chrono::{DateTime, TimeZone, Utc};

/// Default number of bits peeled off per precision level
pub const DEFAULT_PRECISION_STEP: u8 = 4;

/// First shift byte; the shift of a term is `term[0] - SHIFT_START`
pub const SHIFT_START: u8 = 0x20;

/// Length of every prefix-coded term
pub const PREFIX_CODED_LEN: usize = 9;

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;

/// One rung of the precision ladder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrecisionTerm {
    /// Number of low-order bits masked off
    pub shift: u8,
    /// Encoded term bytes
    pub term: Vec<u8>,
}

/// Check that a precision step is usable
pub fn validate_precision_step(step: u8) -> Result<()> {
    if step == 0 || step > 64 {
        return Err(IndexError::Config(format!(
            "precision_step must be in 1..=64, got {}",
            step
        )));
    }
    Ok(())
}

/// Number of precision levels produced for a step
///
/// `ceil(64 / step)`: 16 levels for the default step of 4.
pub fn precision_levels(step: u8) -> usize {
    let step = step.max(1) as usize;
    64usize.div_ceil(step)
}

/// Map an `f64` onto an `i64` with the same ordering
///
/// Negative floats have their non-sign bits flipped so that more negative
/// values compare smaller.
pub fn f64_to_sortable_i64(value: f64) -> i64 {
    let bits = value.to_bits() as i64;
    if bits < 0 {
        bits ^ 0x7fff_ffff_ffff_ffff
    } else {
        bits
    }
}

/// Inverse of [`f64_to_sortable_i64`]
pub fn sortable_i64_to_f64(sortable: i64) -> f64 {
    let bits = if sortable < 0 {
        sortable ^ 0x7fff_ffff_ffff_ffff
    } else {
        sortable
    };
    f64::from_bits(bits as u64)
}

/// Nanoseconds since the Unix epoch for a datetime
///
/// Datetimes outside the `i64` nanosecond range (roughly years 1677..2262)
/// are rejected rather than silently clamped.
pub fn datetime_to_i64(value: &DateTime<Utc>) -> Result<i64> {
    value.timestamp_nanos_opt().ok_or_else(|| {
        IndexError::invalid_input(format!("datetime {} is out of indexable range", value))
    })
}

/// Inverse of [`datetime_to_i64`]
pub fn i64_to_datetime(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

/// Encode one precision level of a value
pub fn prefix_coded(value: i64, shift: u8) -> Vec<u8> {
    debug_assert!(shift < 64, "shift must be below 64");
    let shifted = ((value as u64) ^ SIGN_BIT) >> shift;
    let mut term = Vec::with_capacity(PREFIX_CODED_LEN);
    term.push(SHIFT_START + shift);
    term.extend_from_slice(&shifted.to_be_bytes());
    term
}

/// Decode a prefix-coded term into `(shift, value)`
///
/// The returned value has its low `shift` bits cleared, i.e. it is the lower
/// bound of the range the term covers.
pub fn decode_prefix_coded(term: &[u8]) -> Result<(u8, i64)> {
    if term.len() != PREFIX_CODED_LEN {
        return Err(IndexError::invalid_input(format!(
            "prefix-coded term must be {} bytes, got {}",
            PREFIX_CODED_LEN,
            term.len()
        )));
    }
    let shift = term[0].wrapping_sub(SHIFT_START);
    if shift >= 64 {
        return Err(IndexError::invalid_input(format!(
            "invalid shift byte 0x{:02x}",
            term[0]
        )));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&term[1..]);
    let shifted = u64::from_be_bytes(raw);
    let value = ((shifted << shift) ^ SIGN_BIT) as i64;
    Ok((shift, value))
}

/// Shred a value into its full precision ladder
///
/// Output is ordered from shift 0 (exact) to the coarsest shift and is
/// byte-for-byte deterministic.
pub fn prefix_coded_terms(value: i64, step: u8) -> Vec<PrecisionTerm> {
    let step = step.max(1);
    (0..64u32)
        .step_by(step as usize)
        .map(|shift| {
            let shift = shift as u8;
            PrecisionTerm {
                shift,
                term: prefix_coded(value, shift),
            }
        })
        .collect()
}
