//! Symbol sources: where the symbolizer gets function/file/line information
//!
//! A [`SymbolSource`] answers one question: which function, file and line
//! does this address belong to? The symbolizer holds a `&dyn SymbolSource`,
//! so a DWARF reader, an in-process runtime table or a test fake can be
//! swapped in without touching the symbolization pass.

use std::collections::BTreeMap;

use crate::domain::SymbolTableError;

/// Symbol information for one address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    /// Function name as the source knows it (possibly mangled).
    pub function: String,
    /// Source file; empty when unknown.
    pub file: String,
    /// Line number; 0 when unknown.
    pub line: i64,
}

impl SymbolInfo {
    #[must_use]
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: i64) -> Self {
        Self { function: function.into(), file: file.into(), line }
    }
}

/// Capability to resolve an address to symbol information.
///
/// `None` means the source has nothing for this address, which is not an
/// error: the frame simply stays unsymbolized.
pub trait SymbolSource {
    fn resolve(&self, address: u64) -> Option<SymbolInfo>;
}

impl<S: SymbolSource + ?Sized> SymbolSource for &S {
    fn resolve(&self, address: u64) -> Option<SymbolInfo> {
        (**self).resolve(address)
    }
}

impl<S: SymbolSource + ?Sized> SymbolSource for Box<S> {
    fn resolve(&self, address: u64) -> Option<SymbolInfo> {
        (**self).resolve(address)
    }
}

/// A source that knows no symbols.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

impl SymbolSource for NoSymbols {
    fn resolve(&self, _address: u64) -> Option<SymbolInfo> {
        None
    }
}

/// In-memory table of `[start, end)` address ranges to symbols
///
/// This is the shape of a runtime's own function table: each function covers
/// a contiguous code range.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    /// start -> (end, symbol)
    ranges: BTreeMap<u64, (u64, SymbolInfo)>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `symbol` for the code range `[start, end)`.
    ///
    /// # Errors
    /// Returns a [`SymbolTableError`] if the range is empty or overlaps a
    /// range already in the table.
    pub fn insert(
        &mut self,
        start: u64,
        end: u64,
        symbol: SymbolInfo,
    ) -> Result<(), SymbolTableError> {
        if start >= end {
            return Err(SymbolTableError::EmptyRange { start, end });
        }
        // The closest range starting below `end` is the only one that can overlap
        if let Some((&prev_start, (prev_end, _))) = self.ranges.range(..end).next_back() {
            if *prev_end > start {
                return Err(SymbolTableError::Overlap { start, end, prev_start, prev_end: *prev_end });
            }
        }

        self.ranges.insert(start, (end, symbol));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl SymbolSource for SymbolTable {
    fn resolve(&self, address: u64) -> Option<SymbolInfo> {
        let (_, (end, symbol)) = self.ranges.range(..=address).next_back()?;
        (address < *end).then(|| symbol.clone())
    }
}

/// Ordered list of sources; the first one that knows an address wins.
///
/// Typically one [`DwarfSymbolSource`](super::DwarfSymbolSource) per mapped
/// module, each answering only for its own address range.
#[derive(Default)]
pub struct ChainedSymbolSource {
    sources: Vec<Box<dyn SymbolSource>>,
}

impl ChainedSymbolSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl SymbolSource + 'static) {
        self.sources.push(Box::new(source));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl SymbolSource for ChainedSymbolSource {
    fn resolve(&self, address: u64) -> Option<SymbolInfo> {
        self.sources.iter().find_map(|source| source.resolve(address))
    }
}
