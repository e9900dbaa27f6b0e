//! # cpuprof - CPU Sample Stream to Call-Stack Profile Conversion
//!
//! cpuprof turns the raw output of a statistical CPU sampling profiler, a
//! flat stream of 64-bit words holding sampled program-counter stacks, into
//! a normalized call-stack profile: merged samples with counts and CPU time,
//! deduplicated locations attributed to loaded modules, and resolved
//! function/file/line information.
//!
//! ## Architecture Overview
//!
//! ```text
//!   raw words / bytes        mapping table         symbol source
//!          │                       │                     │
//!          ▼                       │                     │
//! ┌──────────────────┐             │                     │
//! │  Stream Decoder  │ period, (count, addresses)        │
//! └────────┬─────────┘             │                     │
//!          ▼                       ▼                     │
//! ┌──────────────────────────────────────┐               │
//! │ Location Interner (ProfileBuilder)   │               │
//! │  address → LocationId, stack merge   │               │
//! └────────┬─────────────────────────────┘               │
//!          ▼                                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │ Symbolizer: LocationId → Line(FunctionId, line)          │
//! └────────┬─────────────────────────────────────────────────┘
//!          ▼
//! ┌──────────────────────────────────────┐
//! │ Runtime-Frame Trimmer (TrimConfig)   │
//! └────────┬─────────────────────────────┘
//!          ▼
//!       Profile ──▶ ProfileWriter (external format)
//! ```
//!
//! ## Module Structure
//!
//! - [`decoder`]: record stream validation and decoding
//! - [`builder`]: location interning, mapping attribution, sample merging
//! - [`symbolization`]: mapping table, symbol sources, symbolization pass
//! - [`trimming`]: runtime frame removal and sample re-merging
//! - [`profile`]: the in-memory profile model
//! - [`export`]: the writer seam and a JSON writer
//! - [`domain`]: identity newtypes and error types
//!
//! ## Typical Usage
//!
//! ```rust,ignore
//! let mappings = MappingTable::parse_maps(&maps_text)?;
//! let symbols = DwarfSymbolSource::new("/path/to/binary")?;
//! let profile = cpuprof::convert(&words, &mappings, &symbols, &TrimConfig::default())?;
//!
//! JsonProfileWriter::pretty(std::io::stdout()).write_profile(&profile)?;
//! ```
//!
//! ## Concurrency
//!
//! One conversion is a single synchronous pass that owns its profile and
//! lookup state. Independent streams may be converted on separate threads,
//! each with its own inputs; nothing is shared between conversions.

pub mod builder;
pub mod decoder;
pub mod domain;
pub mod export;
pub mod profile;
pub mod symbolization;
pub mod trimming;

use log::info;

pub use builder::{build_profile, ProfileBuilder};
pub use decoder::{decode, words_from_bytes, Decoder, Endianness};
pub use domain::FormatError;
pub use profile::Profile;
pub use symbolization::{MappingTable, SymbolSource, Symbolizer};
pub use trimming::{RuntimeFrameTrimmer, TrimConfig};

/// Run the whole pipeline: decode, intern, symbolize, trim.
///
/// # Errors
/// Returns a [`FormatError`] for a malformed stream; no profile is produced.
/// Missing mappings and symbols are not errors.
pub fn convert(
    words: &[u64],
    mappings: &MappingTable,
    symbols: &dyn SymbolSource,
    trim: &TrimConfig,
) -> Result<Profile, FormatError> {
    let mut profile = build_profile(words, mappings)?;
    let symbolized = Symbolizer::new(symbols).symbolize(&mut profile);
    let trimmed = RuntimeFrameTrimmer::new(trim).trim(&mut profile);

    info!(
        "Converted profile: {} samples, {} locations ({} unresolved), {} functions, {} frames trimmed",
        profile.samples.len(),
        profile.locations.len(),
        symbolized.unresolved,
        profile.functions.len(),
        trimmed.frames_removed
    );
    Ok(profile)
}

/// [`convert`] for a raw byte buffer.
///
/// # Errors
/// As [`convert`], plus [`FormatError::PartialWord`] if the buffer length is
/// not a multiple of 8.
pub fn convert_bytes(
    bytes: &[u8],
    endianness: Endianness,
    mappings: &MappingTable,
    symbols: &dyn SymbolSource,
    trim: &TrimConfig,
) -> Result<Profile, FormatError> {
    let words = words_from_bytes(bytes, endianness)?;
    convert(&words, mappings, symbols, trim)
}
