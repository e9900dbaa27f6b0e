//! Structured error types for cpuprof
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Only malformed input is an error; a missing mapping or symbol is reflected
//! in the output data instead.

use thiserror::Error;

/// Malformed raw sample stream. Aborts the whole conversion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("empty stream: missing header record")]
    MissingHeader,

    #[error("malformed header record: expected [3, 0, period], found {found:?}")]
    BadHeader { found: Vec<u64> },

    #[error("record at word {offset} declares {declared} words but only {remaining} remain")]
    Truncated { offset: usize, declared: u64, remaining: usize },

    #[error("record at word {offset} declares invalid length {declared} (minimum is 3)")]
    InvalidLength { offset: usize, declared: u64 },

    #[error("record at word {offset} has non-zero reserved field {value}")]
    NonZeroReserved { offset: usize, value: u64 },

    #[error("byte stream length {len} is not a multiple of 8")]
    PartialWord { len: usize },

    #[error("{what} value {value} overflows the profile value range")]
    ValueOverflow { what: &'static str, value: u64 },
}

/// Invalid or unreadable trim configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid frame pattern {0:?}")]
    InvalidPattern(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Range rejected by an in-memory symbol table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolTableError {
    #[error("symbol range 0x{start:x}-0x{end:x} is empty")]
    EmptyRange { start: u64, end: u64 },

    #[error("symbol range 0x{start:x}-0x{end:x} overlaps 0x{prev_start:x}-0x{prev_end:x}")]
    Overlap { start: u64, end: u64, prev_start: u64, prev_end: u64 },
}

/// Failure while handing a profile to a writer
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
