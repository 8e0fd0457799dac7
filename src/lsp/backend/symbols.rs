//! Workspace symbol search over the global symbol cache

use tower_lsp::lsp_types::{Location, Position, Range, SymbolInformation, SymbolKind, Url};

use crate::lsp::global_cache::{CobolFileSymbol, GlobalCaches, SymbolMap};

/// Symbols whose name contains `query` (case-insensitive). An empty query
/// matches everything. Sorted by name, then file, then line.
pub fn workspace_symbols(caches: &GlobalCaches, query: &str) -> Vec<SymbolInformation> {
    let query = query.to_ascii_lowercase();
    let table = caches.global_symbol_cache();

    let mut symbols = Vec::new();
    for (map, kind) in [
        (&table.callable_symbols, SymbolKind::FUNCTION),
        (&table.class_symbols, SymbolKind::CLASS),
        (&table.method_symbols, SymbolKind::METHOD),
    ] {
        collect_matches(map, kind, &query, &mut symbols);
    }

    symbols.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.location.uri.as_str().cmp(b.location.uri.as_str()))
            .then_with(|| a.location.range.start.line.cmp(&b.location.range.start.line))
    });
    symbols
}

/// Protocol locations for every definition of a callable name.
pub fn callable_locations(caches: &GlobalCaches, name: &str) -> Vec<Location> {
    caches
        .lookup_callable(name)
        .iter()
        .filter_map(file_symbol_location)
        .collect()
}

fn collect_matches(
    map: &SymbolMap,
    kind: SymbolKind,
    query: &str,
    out: &mut Vec<SymbolInformation>,
) {
    for (name, definitions) in map {
        if !name.contains(query) {
            continue;
        }
        for definition in definitions {
            let Some(location) = file_symbol_location(definition) else {
                continue;
            };
            #[allow(deprecated)]
            out.push(SymbolInformation {
                name: name.to_ascii_uppercase(),
                kind,
                tags: None,
                deprecated: None,
                location,
                container_name: None,
            });
        }
    }
}

fn file_symbol_location(symbol: &CobolFileSymbol) -> Option<Location> {
    let uri = Url::from_file_path(&symbol.filename).ok()?;
    let start = Position::new(symbol.lnum, 0);
    Some(Location {
        uri,
        range: Range { start, end: start },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caches() -> GlobalCaches {
        let mut caches = GlobalCaches::new();
        caches.add_symbol("PAYROLL", "/src/payroll.cbl", 1);
        caches.add_symbol("PAYCALC", "/src/payroll.cbl", 40);
        caches.add_class_symbol("Account", "/src/account.cbl", 0);
        caches.add_method_symbol("Deposit", "/src/account.cbl", 12);
        caches
    }

    #[test]
    fn test_query_is_case_insensitive_substring() {
        let found = workspace_symbols(&caches(), "Pay");
        let names: Vec<&str> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["PAYCALC", "PAYROLL"]);
        assert_eq!(found[0].kind, SymbolKind::FUNCTION);
        assert_eq!(found[0].location.range.start, Position::new(40, 0));
    }

    #[test]
    fn test_empty_query_lists_every_kind() {
        let found = workspace_symbols(&caches(), "");
        assert_eq!(found.len(), 4);
        assert!(found.iter().any(|s| s.kind == SymbolKind::CLASS && s.name == "ACCOUNT"));
        assert!(found.iter().any(|s| s.kind == SymbolKind::METHOD && s.name == "DEPOSIT"));
    }

    #[test]
    fn test_callable_locations() {
        let locations = callable_locations(&caches(), "payroll");
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].uri.as_str(), "file:///src/payroll.cbl");
        assert!(callable_locations(&caches(), "unknown").is_empty());
    }
}
