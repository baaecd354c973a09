//! Stormline Wire Codec
//!
//! Bit-exact decoding of the replication capture's primitive encodings and the
//! hand-off type through which the external replication framework delivers
//! decoded property bundles.
//!
//! # Encodings
//!
//! - **Adaptive integers**: `read_int(max)` consumes a content-dependent
//!   number of bits.
//! - **Packed integers**: up to five 7-bit groups, least-significant first.
//! - **Quantized vectors**: a bit-width selector followed by three biased axes.
//! - **Length-prefixed strings**: signed length selects UTF-16LE or
//!   single-byte text.
//!
//! Bits within a byte are read least-significant first. Multi-byte integers
//! are little-endian.

#![deny(unsafe_code)]

mod bit_reader;

use stormline_model::FieldValue;
use thiserror::Error;

pub use bit_reader::{BitReader, SeekOrigin};

// ============================================================================
// Errors
// ============================================================================

/// Malformed or truncated input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("read of {bits} bits at position {position} exceeds length {len}")]
    OutOfRange {
        position: usize,
        bits: usize,
        len: usize,
    },

    #[error("seek by {offset} from {origin:?} leaves the range [0, {len}]")]
    SeekOutOfRange {
        offset: usize,
        origin: SeekOrigin,
        len: usize,
    },

    #[error("invalid length prefix {0}")]
    InvalidLength(i64),

    #[error("packed vector with selector {bits} and scale {scale} cannot be decoded")]
    InvalidPackedVector { bits: u32, scale: i32 },

    #[error("bit length {bit_len} exceeds the {available} bits of backing data")]
    BitLengthExceedsData { bit_len: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;

// ============================================================================
// Field Groups
// ============================================================================

/// One decoded property bundle for a single actor, as delivered by the
/// replication framework.
///
/// `path` is the replicated type path the bundle was exported under. Fields
/// keep their arrival order; a bundle only carries the properties that changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetFieldGroup {
    pub path: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl NetFieldGroup {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style append, mostly for fixtures.
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    /// First value delivered under `name`.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
