//! In-memory call-stack profile
//!
//! The [`Profile`] owns every sample, location, function and mapping it
//! lists. Samples reference locations, locations reference functions and
//! mappings, always by identity. Identities are 1-based positions in the
//! owning list, so lookups are plain indexing.

use log::warn;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::{FunctionId, LocationId, MappingId, ValueType};
use crate::symbolization::MemoryRange;

/// Period type of every profile produced from a CPU sample stream.
pub const CPU_PERIOD_TYPE: (&str, &str) = ("cpu", "nanoseconds");

/// Sample types of a CPU profile: `[count, count * period]`.
pub const CPU_SAMPLE_TYPES: [(&str, &str); 2] = [("samples", "count"), ("cpu", "nanoseconds")];

/// A finished (or in-progress) call-stack profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    /// Sampling period, in the unit of `period_type`.
    pub period: i64,
    pub period_type: ValueType,
    /// Descriptors parallel to each [`Sample::values`].
    pub sample_types: Vec<ValueType>,
    pub samples: Vec<Sample>,
    pub locations: Vec<Location>,
    pub functions: Vec<Function>,
    pub mappings: Vec<Mapping>,
}

/// One merged observation of a call stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sample {
    /// Innermost frame first.
    pub locations: Vec<LocationId>,
    pub values: Vec<i64>,
}

/// One distinct program counter observed while sampling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub id: LocationId,
    /// Raw address as it appeared in the sample stream.
    pub address: u64,
    pub mapping: Option<MappingId>,
    /// Empty until symbolized; empty afterwards if no symbol was found.
    pub lines: Vec<Line>,
    /// Seen in a caller position, so `address` points just past a call.
    #[serde(skip)]
    pub return_address: bool,
}

impl Location {
    /// Address to hand to a symbol source: the call site for return
    /// addresses, the address itself for leaf program counters.
    #[must_use]
    pub fn lookup_address(&self) -> u64 {
        if self.return_address {
            self.address.saturating_sub(1)
        } else {
            self.address
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Line {
    pub function: FunctionId,
    pub line: i64,
}

/// A resolved function, shared by every location that resolves to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Function {
    pub id: FunctionId,
    /// Display name (demangled).
    pub name: String,
    /// Name as reported by the symbol source.
    pub system_name: String,
    pub filename: String,
}

/// An address range attributed to one loaded module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mapping {
    pub id: MappingId,
    pub start: u64,
    /// Exclusive.
    pub end: u64,
    pub offset: u64,
    pub filename: String,
    pub build_id: String,
}

impl Mapping {
    #[must_use]
    pub fn range(&self) -> MemoryRange {
        MemoryRange { start: self.start, end: self.end }
    }

    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        self.range().contains(addr)
    }
}

impl Profile {
    /// An empty CPU profile with the fixed `cpu/nanoseconds` descriptors.
    #[must_use]
    pub fn cpu(period_ns: i64) -> Self {
        Self {
            period: period_ns,
            period_type: ValueType::new(CPU_PERIOD_TYPE.0, CPU_PERIOD_TYPE.1),
            sample_types: CPU_SAMPLE_TYPES
                .iter()
                .map(|(kind, unit)| ValueType::new(*kind, *unit))
                .collect(),
            samples: Vec::new(),
            locations: Vec::new(),
            functions: Vec::new(),
            mappings: Vec::new(),
        }
    }

    /// Returns true if this profile measures CPU time.
    #[must_use]
    pub fn is_cpu(&self) -> bool {
        self.period_type.kind == CPU_PERIOD_TYPE.0
    }

    #[must_use]
    pub fn location(&self, id: LocationId) -> Option<&Location> {
        id.index().and_then(|i| self.locations.get(i))
    }

    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        id.index().and_then(|i| self.functions.get(i))
    }

    #[must_use]
    pub fn mapping(&self, id: MappingId) -> Option<&Mapping> {
        id.index().and_then(|i| self.mappings.get(i))
    }

    /// Name of the function a location resolved to, if any.
    ///
    /// Uses the first (innermost) line of the location.
    #[must_use]
    pub fn function_name(&self, id: LocationId) -> Option<&str> {
        let line = self.location(id)?.lines.first()?;
        self.function(line.function).map(|f| f.name.as_str())
    }

    /// Sum of the values at `index` over all samples.
    #[must_use]
    pub fn total(&self, index: usize) -> i64 {
        self.samples.iter().filter_map(|s| s.values.get(index)).sum()
    }

    /// Merge samples with identical location sequences, summing their
    /// values. First-seen order is kept. Returns how many samples were
    /// folded away.
    ///
    /// A sample whose values cannot be added without overflowing stays a
    /// separate sample; later duplicates merge into it.
    pub fn merge_duplicate_samples(&mut self) -> usize {
        let before = self.samples.len();
        let mut index: HashMap<Vec<LocationId>, usize> = HashMap::with_capacity(before);
        let mut merged: Vec<Sample> = Vec::with_capacity(before);

        for sample in self.samples.drain(..) {
            if let Some(&existing) = index.get(&sample.locations) {
                if accumulate(&mut merged[existing].values, &sample.values).is_some() {
                    continue;
                }
                warn!(
                    "Sample values overflow when merged, keeping stack of {} frames apart",
                    sample.locations.len()
                );
            }
            index.insert(sample.locations.clone(), merged.len());
            merged.push(sample);
        }

        self.samples = merged;
        before - self.samples.len()
    }
}

/// Add `values` element-wise into `into`.
///
/// Returns `None` and leaves `into` untouched if any sum overflows.
#[must_use]
pub(crate) fn accumulate(into: &mut Vec<i64>, values: &[i64]) -> Option<()> {
    let len = into.len().max(values.len());
    let sums = (0..len)
        .map(|i| {
            let acc = into.get(i).copied().unwrap_or(0);
            acc.checked_add(values.get(i).copied().unwrap_or(0))
        })
        .collect::<Option<Vec<i64>>>()?;
    *into = sums;
    Some(())
}
