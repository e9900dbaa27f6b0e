use addr2line::Context;
use anyhow::{Context as _, Result};
use gimli::{EndianRcSlice, RunTimeEndian};
use log::info;
use object::{Object, ObjectSection};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use super::mappings::MemoryRange;
use super::source::{SymbolInfo, SymbolSource};
use crate::profile::Mapping;

/// Symbol source backed by the DWARF debug info of one module
///
/// Without a load range, addresses are looked up as-is. Once bound to a
/// mapping, runtime addresses inside the mapping are translated to file
/// addresses (`addr - start + offset`) and anything outside it is `None`,
/// so several of these can be chained, one per loaded module.
///
/// Includes a cache to avoid re-resolving the same addresses repeatedly.
pub struct DwarfSymbolSource {
    ctx: Context<EndianRcSlice<RunTimeEndian>>,
    load: Option<(MemoryRange, u64)>,
    /// Cache of resolved symbols by lookup address
    cache: RefCell<HashMap<u64, Option<SymbolInfo>>>,
}

impl DwarfSymbolSource {
    /// Load DWARF debug info from the given binary
    ///
    /// # Errors
    /// Returns an error if the binary file cannot be read or parsed, or if DWARF debug info is missing
    pub fn new<P: AsRef<Path>>(binary_path: P) -> Result<Self> {
        let binary_data = fs::read(binary_path.as_ref()).context("Failed to read binary file")?;

        let obj_file = object::File::parse(&*binary_data).context("Failed to parse object file")?;

        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section)?;
        let ctx = Context::from_dwarf(dwarf).context("Failed to load DWARF debug information")?;

        info!("Loaded DWARF debug info from {}", binary_path.as_ref().display());
        Ok(Self { ctx, load: None, cache: RefCell::new(HashMap::new()) })
    }

    /// Load the module backing `mapping` and bind it to the mapping's range
    ///
    /// # Errors
    /// Same as [`DwarfSymbolSource::new`] for `mapping.filename`.
    pub fn for_mapping(mapping: &Mapping) -> Result<Self> {
        let source = Self::new(&mapping.filename)
            .with_context(|| format!("Failed to load symbols for mapping {}", mapping.id))?;
        Ok(source.with_load_range(mapping.range(), mapping.offset))
    }

    /// Bind to a load range: `range.start` corresponds to `file_offset`.
    #[must_use]
    pub fn with_load_range(mut self, range: MemoryRange, file_offset: u64) -> Self {
        self.load = Some((range, file_offset));
        self.cache.borrow_mut().clear();
        self
    }

    /// Translate a runtime address to the address DWARF knows it by
    ///
    /// Returns `None` for addresses outside the bound load range.
    fn adjust_address(&self, addr: u64) -> Option<u64> {
        match self.load {
            Some((range, file_offset)) if range.contains(addr) => {
                Some(addr - range.start + file_offset)
            }
            Some(_) => None,
            None => Some(addr),
        }
    }

    /// Innermost frame for a file address, including inlined callees.
    fn lookup(&self, file_addr: u64) -> Option<SymbolInfo> {
        let mut frame_iter = self.ctx.find_frames(file_addr).skip_all_loads().ok()?;
        let frame = frame_iter.next().ok()??;

        let function = frame.function.and_then(|f| f.raw_name().ok().map(|s| s.to_string()))?;
        let (file, line) = frame
            .location
            .map(|loc| {
                (
                    loc.file.map(std::string::ToString::to_string).unwrap_or_default(),
                    loc.line.map_or(0, i64::from),
                )
            })
            .unwrap_or_default();

        Some(SymbolInfo { function, file, line })
    }
}

impl SymbolSource for DwarfSymbolSource {
    fn resolve(&self, address: u64) -> Option<SymbolInfo> {
        let file_addr = self.adjust_address(address)?;

        // Check cache first
        if let Some(cached) = self.cache.borrow().get(&file_addr) {
            return cached.clone();
        }

        let resolved = self.lookup(file_addr);
        self.cache.borrow_mut().insert(file_addr, resolved.clone());
        resolved
    }
}
