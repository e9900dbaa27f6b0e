//! Mapping table for attributing addresses to loaded modules
//!
//! The table is supplied by whoever discovered the process's address space.
//! It is read-only during a conversion: the interner looks up the mapping
//! that contains each new address, and DWARF symbol sources use a mapping's
//! range and file offset to translate runtime addresses.

use anyhow::{Context, Result};
use log::{info, warn};

use crate::domain::MappingId;
use crate::profile::Mapping;

/// Memory range of a loaded binary in a process's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    #[must_use]
    pub fn overlaps(&self, other: &MemoryRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Ordered collection of mappings.
///
/// Lookups return the first mapping in insertion order whose range contains
/// the address.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    mappings: Vec<Mapping>,
}

impl MappingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mapping and return its identity.
    pub fn add(
        &mut self,
        start: u64,
        end: u64,
        offset: u64,
        filename: impl Into<String>,
        build_id: impl Into<String>,
    ) -> MappingId {
        let id = MappingId::from_index(self.mappings.len());
        let mapping = Mapping {
            id,
            start,
            end,
            offset,
            filename: filename.into(),
            build_id: build_id.into(),
        };

        if let Some(existing) = self.mappings.iter().find(|m| m.range().overlaps(&mapping.range())) {
            warn!(
                "Mapping 0x{:x}-0x{:x} ({}) overlaps {} 0x{:x}-0x{:x} ({}); first match wins",
                mapping.start,
                mapping.end,
                mapping.filename,
                existing.id,
                existing.start,
                existing.end,
                existing.filename
            );
        }

        self.mappings.push(mapping);
        id
    }

    /// Find the mapping whose `[start, end)` contains `addr`.
    #[must_use]
    pub fn find(&self, addr: u64) -> Option<&Mapping> {
        self.mappings.iter().find(|m| m.contains(addr))
    }

    #[must_use]
    pub fn get(&self, id: MappingId) -> Option<&Mapping> {
        id.index().and_then(|i| self.mappings.get(i))
    }

    #[must_use]
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Build a table from text in the Linux `/proc/<pid>/maps` format
    ///
    /// Only executable mappings are kept, since only they can contain
    /// sampled program counters. The caller is responsible for obtaining the
    /// text; this function does no I/O.
    ///
    /// Each line is `start-end perms offset dev inode [pathname]`.
    ///
    /// # Errors
    /// Returns an error if an address range or offset is not valid hex.
    pub fn parse_maps(text: &str) -> Result<Self> {
        let mut table = Self::new();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 5 {
                warn!("Skipping maps line {}: too few fields: {line:?}", lineno + 1);
                continue;
            }

            let (start, end) = parts[0]
                .split_once('-')
                .context(format!("Missing '-' in address range on line {}", lineno + 1))?;
            let start = u64::from_str_radix(start, 16)
                .context(format!("Failed to parse range start on line {}", lineno + 1))?;
            let end = u64::from_str_radix(end, 16)
                .context(format!("Failed to parse range end on line {}", lineno + 1))?;
            let offset = u64::from_str_radix(parts[2], 16)
                .context(format!("Failed to parse offset on line {}", lineno + 1))?;

            if !parts[1].contains('x') {
                continue;
            }

            // Pathnames may contain spaces
            let filename = if parts.len() > 5 { parts[5..].join(" ") } else { String::new() };
            table.add(start, end, offset, filename, "");
        }

        info!("Parsed {} executable mappings", table.len());
        Ok(table)
    }
}

impl FromIterator<(u64, u64, u64, String, String)> for MappingTable {
    fn from_iter<I: IntoIterator<Item = (u64, u64, u64, String, String)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (start, end, offset, filename, build_id) in iter {
            table.add(start, end, offset, filename, build_id);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPS: &str = "\
55d0c2a00000-55d0c2a02000 r--p 00000000 fd:01 1234   /usr/bin/app
55d0c2a02000-55d0c2a08000 r-xp 00002000 fd:01 1234   /usr/bin/app
7f1e4c000000-7f1e4c021000 rw-p 00000000 00:00 0
7f1e4d128000-7f1e4d2bd000 r-xp 00028000 fd:01 5678   /usr/lib/x86_64-linux-gnu/libc.so.6
7ffd7a3f1000-7ffd7a3f3000 r-xp 00000000 00:00 0      [vdso]
";

    #[test]
    fn test_memory_range_contains() {
        let range = MemoryRange { start: 0x1000, end: 0x2000 };

        assert!(range.contains(0x1000));
        assert!(range.contains(0x1500));
        assert!(range.contains(0x1FFF));
        assert!(!range.contains(0x0FFF));
        assert!(!range.contains(0x2000));
        assert!(!range.contains(0x2001));
    }

    #[test]
    fn test_find_returns_containing_mapping() {
        let mut table = MappingTable::new();
        let app = table.add(0x1000, 0x2000, 0, "/bin/app", "abc");
        let lib = table.add(0x7000, 0x8000, 0x1000, "/lib/libc.so", "def");

        assert_eq!(table.find(0x1800).map(|m| m.id), Some(app));
        assert_eq!(table.find(0x7000).map(|m| m.id), Some(lib));
        assert!(table.find(0x2000).is_none());
        assert_eq!(table.get(lib).unwrap().build_id, "def");
    }

    #[test]
    fn test_overlapping_mappings_first_wins() {
        let mut table = MappingTable::new();
        let first = table.add(0x1000, 0x3000, 0, "a", "");
        table.add(0x2000, 0x4000, 0, "b", "");

        assert_eq!(table.find(0x2500).map(|m| m.id), Some(first));
        assert_eq!(table.find(0x3500).map(|m| m.filename.as_str()), Some("b"));
    }

    #[test]
    fn test_parse_maps_keeps_executable_mappings() {
        let table = MappingTable::parse_maps(MAPS).unwrap();

        assert_eq!(table.len(), 3);
        let app = &table.mappings()[0];
        assert_eq!(app.start, 0x55d0_c2a0_2000);
        assert_eq!(app.end, 0x55d0_c2a0_8000);
        assert_eq!(app.offset, 0x2000);
        assert_eq!(app.filename, "/usr/bin/app");
        assert_eq!(table.mappings()[1].filename, "/usr/lib/x86_64-linux-gnu/libc.so.6");
        assert_eq!(table.mappings()[2].filename, "[vdso]");
    }

    #[test]
    fn test_parse_maps_rejects_bad_hex() {
        assert!(MappingTable::parse_maps("zz-1000 r-xp 0 00:00 0 /bin/x").is_err());
    }

    #[test]
    fn test_from_iterator() {
        let table: MappingTable =
            vec![(0x1000, 0x2000, 0, "/bin/app".to_string(), "id".to_string())]
                .into_iter()
                .collect();
        assert_eq!(table.len(), 1);
        assert_eq!(table.mappings()[0].id, MappingId(1));
    }
}
