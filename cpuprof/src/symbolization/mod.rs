//! # Symbol Resolution and Address Attribution
//!
//! This module turns the raw program counters of a profile into
//! human-readable function names, file paths and line numbers. This process
//! is called **symbolization**.
//!
//! ## The Symbolization Problem
//!
//! A sampled stack is a list of raw addresses like `0x55f3a2b4c780`. A viewer
//! needs instead:
//! - **Function name**: `main.handleRequest`
//! - **File path**: `/src/app/server.go`
//! - **Line number**: `42`
//!
//! ## Key Concepts
//!
//! ### Mappings
//!
//! Each address belongs to at most one loaded module (the executable or a
//! shared library). The [`MappingTable`] records those ranges so every
//! location can name its module, and so module-relative lookups can be done.
//!
//! ### Return Addresses
//!
//! Only the innermost frame of a sample is the interrupted program counter.
//! Every caller frame holds a **return address**: the instruction *after* the
//! call. The call itself may belong to a different line, or, when a call is
//! the last instruction of a function, to a different function. Lookups
//! therefore use `address - 1` for return addresses:
//!
//! ```text
//! 0x1000  main.work:    ...
//! 0x10fb                call runtime.panic   <- call site (address - 1)
//! 0x1100  main.main:    ...                  <- return address
//! ```
//!
//! ### PIE and Load Bias
//!
//! Debug info uses **file addresses**; stacks contain **runtime addresses**.
//! With the mapping that holds an address:
//!
//! ```text
//! File Address = Runtime Address - Mapping Start + Mapping Offset
//! ```
//!
//! ## Symbol Sources
//!
//! The [`Symbolizer`] pass is independent of where symbols come from. It
//! holds a `&dyn` [`SymbolSource`]:
//!
//! - [`SymbolTable`]: in-memory `[start, end)` ranges, the shape of a
//!   runtime's own function table (and of test fakes)
//! - [`DwarfSymbolSource`]: DWARF debug info of one module via `addr2line`,
//!   `gimli` and `object`, optionally bound to its mapping
//! - [`ChainedSymbolSource`]: several sources tried in order, e.g. one DWARF
//!   source per mapping
//!
//! ## Example: Symbolizing a Profile
//!
//! ```rust,ignore
//! let mappings = MappingTable::parse_maps(&maps_text)?;
//!
//! let mut sources = ChainedSymbolSource::new();
//! for mapping in mappings.mappings() {
//!     if let Ok(source) = DwarfSymbolSource::for_mapping(mapping) {
//!         sources.push(source);
//!     }
//! }
//!
//! let mut profile = build_profile(&words, &mappings)?;
//! let stats = Symbolizer::new(&sources).symbolize(&mut profile);
//! ```
//!
//! ## Limitations
//!
//! - **Requires debug symbols** for DWARF resolution
//! - **One line per location**: the innermost inlined frame is used

pub mod dwarf;
pub mod mappings;
pub mod source;
pub mod symbolizer;

pub use dwarf::DwarfSymbolSource;
pub use mappings::{MappingTable, MemoryRange};
pub use source::{ChainedSymbolSource, NoSymbols, SymbolInfo, SymbolSource, SymbolTable};
pub use symbolizer::{SymbolizeStats, Symbolizer};
