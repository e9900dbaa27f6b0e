use log::{debug, info};
use rustc_demangle::demangle;
use std::collections::HashMap;

use super::source::{SymbolInfo, SymbolSource};
use crate::domain::FunctionId;
use crate::profile::{Function, Line, Profile};

/// Counts from one symbolization pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolizeStats {
    /// Locations that gained a line in this pass.
    pub resolved: usize,
    /// Locations the source had nothing for.
    pub unresolved: usize,
    /// Locations that already had lines.
    pub skipped: usize,
}

/// Attaches function/file/line information to a profile's locations
///
/// The symbol source is injected and only read. Running the pass again on
/// the same profile changes nothing for locations that already resolved.
pub struct Symbolizer<'a> {
    source: &'a dyn SymbolSource,
}

impl<'a> Symbolizer<'a> {
    #[must_use]
    pub fn new(source: &'a dyn SymbolSource) -> Self {
        Self { source }
    }

    /// Resolve every location that has no lines yet.
    pub fn symbolize(&self, profile: &mut Profile) -> SymbolizeStats {
        let mut stats = SymbolizeStats::default();

        // Functions from earlier passes stay shared
        let mut functions: HashMap<(String, String), FunctionId> = profile
            .functions
            .iter()
            .map(|f| ((f.name.clone(), f.filename.clone()), f.id))
            .collect();

        for location in &mut profile.locations {
            if !location.lines.is_empty() {
                stats.skipped += 1;
                continue;
            }

            let Some(symbol) = self.source.resolve(location.lookup_address()) else {
                debug!("No symbol for {} at 0x{:x}", location.id, location.address);
                stats.unresolved += 1;
                continue;
            };

            let line = symbol.line;
            let function = intern_function(&mut profile.functions, &mut functions, symbol);
            location.lines.push(Line { function, line });
            stats.resolved += 1;
        }

        info!(
            "Symbolized {} locations ({} unresolved, {} already resolved), {} functions",
            stats.resolved,
            stats.unresolved,
            stats.skipped,
            profile.functions.len()
        );
        stats
    }

    /// Demangle a symbol name for display
    #[must_use]
    pub fn demangle_symbol(symbol: &str) -> String {
        format!("{:#}", demangle(symbol))
    }
}

/// Find or create the function for `symbol`, keyed by display name and file.
fn intern_function(
    functions: &mut Vec<Function>,
    index: &mut HashMap<(String, String), FunctionId>,
    symbol: SymbolInfo,
) -> FunctionId {
    let name = Symbolizer::demangle_symbol(&symbol.function);
    let key = (name, symbol.file);
    if let Some(&id) = index.get(&key) {
        return id;
    }

    let id = FunctionId::from_index(functions.len());
    functions.push(Function {
        id,
        name: key.0.clone(),
        system_name: symbol.function,
        filename: key.1.clone(),
    });
    index.insert(key, id);
    id
}
