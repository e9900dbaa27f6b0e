use cpuprof::domain::LocationId;
use cpuprof::profile::{Location, Profile};
use cpuprof::symbolization::{
    ChainedSymbolSource, DwarfSymbolSource, MemoryRange, SymbolSource, Symbolizer,
};

fn test_binary() -> std::path::PathBuf {
    std::env::current_exe().expect("Failed to get current exe")
}

/// Text symbols of the test binary as (file address, demangled name), via nm.
fn text_symbols() -> Option<Vec<(u64, String)>> {
    let output = std::process::Command::new("nm").arg("-C").arg(test_binary()).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let symbols = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| line.contains(" T ") || line.contains(" t "))
        .filter_map(|line| {
            let (addr, rest) = line.split_once(' ')?;
            let addr = u64::from_str_radix(addr, 16).ok()?;
            let name = rest.get(2..)?.to_string();
            (addr != 0).then_some((addr, name))
        })
        .collect();
    Some(symbols)
}

#[test]
fn test_dwarf_source_creation() {
    let source = DwarfSymbolSource::new(test_binary());
    assert!(source.is_ok(), "Failed to create symbol source: {:?}", source.err());
}

#[test]
fn test_dwarf_source_resolves_function_names() {
    let Some(symbols) = text_symbols() else {
        println!("nm not available, skipping");
        return;
    };

    let source = DwarfSymbolSource::new(test_binary()).expect("Failed to create symbol source");

    let mut found_valid_symbol = false;
    let mut attempts = 0;
    for (addr, name) in symbols.iter().take(50) {
        attempts += 1;
        if let Some(symbol) = source.resolve(*addr) {
            println!("0x{addr:x} ({name}) -> {} at {}:{}", symbol.function, symbol.file, symbol.line);
            assert!(!symbol.function.is_empty());
            found_valid_symbol = true;
            break;
        }
    }

    assert!(
        found_valid_symbol,
        "Symbol source should resolve at least one address to a function name.\n\
         Tried {attempts} addresses but none resolved.\n\
         This might indicate missing debug symbols."
    );
}

#[test]
fn test_dwarf_source_bound_to_mapping_translates_addresses() {
    let Some(symbols) = text_symbols() else {
        println!("nm not available, skipping");
        return;
    };

    let unbound = DwarfSymbolSource::new(test_binary()).expect("Failed to create symbol source");
    let Some((addr, expected)) =
        symbols.iter().find_map(|(addr, _)| unbound.resolve(*addr).map(|s| (*addr, s)))
    else {
        println!("no debug info in test binary, skipping");
        return;
    };

    // Pretend the module is loaded at a high base with file offset 0
    let base = 0x7f00_0000_0000;
    let range = MemoryRange { start: base, end: base + addr + 0x1000 };
    let bound = DwarfSymbolSource::new(test_binary()).unwrap().with_load_range(range, 0);

    assert_eq!(bound.resolve(base + addr), Some(expected));
    assert!(bound.resolve(addr).is_none());
}

#[test]
fn test_symbolizer_with_chained_dwarf_source() {
    let Some(symbols) = text_symbols() else {
        println!("nm not available, skipping");
        return;
    };

    let mut chain = ChainedSymbolSource::new();
    chain.push(DwarfSymbolSource::new(test_binary()).expect("Failed to create symbol source"));

    let mut profile = Profile::cpu(1000);
    profile.locations = symbols
        .iter()
        .take(20)
        .enumerate()
        .map(|(index, (addr, _))| Location {
            id: LocationId::from_index(index),
            address: *addr,
            mapping: None,
            lines: Vec::new(),
            return_address: false,
        })
        .collect();

    let stats = Symbolizer::new(&chain).symbolize(&mut profile);

    assert_eq!(stats.resolved + stats.unresolved, profile.locations.len());
    for location in &profile.locations {
        assert!(location.lines.len() <= 1);
        for line in &location.lines {
            assert!(profile.function(line.function).is_some());
        }
    }
}

#[test]
#[ignore] // Only run if you want to verify full debug info is available
fn test_dwarf_debug_info_available() {
    // This test verifies that DWARF debug info with file:line is available
    // It's ignored by default because it depends on build configuration
    let symbols = text_symbols().expect("nm is required for this test");
    let source = DwarfSymbolSource::new(test_binary()).expect("Failed to create symbol source");

    for (addr, _) in symbols.iter().take(50) {
        if let Some(symbol) = source.resolve(*addr) {
            if !symbol.file.is_empty() && symbol.line > 0 {
                println!("Found debug info: {} at {}:{}", symbol.function, symbol.file, symbol.line);
                return;
            }
        }
    }

    panic!("No source location found - DWARF debug info not available in this build");
}
