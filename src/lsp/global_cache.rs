//! Workspace-wide symbol and copybook registry
//!
//! Two tables are kept, each persisted to its own compressed file:
//!
//! - the symbol table: callable (program/entry), class and method names,
//!   each mapped to every `(file, line)` that defines it;
//! - the file table: every copybook file seen during indexing.
//!
//! Each table remembers the modification time of the file it was loaded
//! from or saved to, so reloading an unchanged file is skipped, and a dirty
//! flag, so saving an unchanged table is skipped.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::backend::persistent_cache::{CacheError, read_compressed_json, write_compressed_json};

pub const SYMBOL_CACHE_FILE: &str = "global-symbol-cache.json.zst";
pub const FILE_CACHE_FILE: &str = "global-file-cache.json.zst";

/// One place a symbol is defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CobolFileSymbol {
    pub filename: String,
    pub lnum: u32,
}

impl CobolFileSymbol {
    pub fn new(filename: impl Into<String>, lnum: u32) -> Self {
        Self {
            filename: filename.into(),
            lnum,
        }
    }
}

pub type SymbolMap = HashMap<String, Vec<CobolFileSymbol>>;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSymbolTable {
    #[serde(with = "crate::serde_helpers::map_as_pairs", default)]
    pub callable_symbols: SymbolMap,
    #[serde(with = "crate::serde_helpers::map_as_pairs", default)]
    pub class_symbols: SymbolMap,
    #[serde(with = "crate::serde_helpers::map_as_pairs", default)]
    pub method_symbols: SymbolMap,
    #[serde(skip)]
    pub last_modified_time: Option<SystemTime>,
    #[serde(skip)]
    pub is_dirty: bool,
}

impl GlobalSymbolTable {
    pub fn is_empty(&self) -> bool {
        self.callable_symbols.is_empty()
            && self.class_symbols.is_empty()
            && self.method_symbols.is_empty()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalFileTable {
    #[serde(with = "crate::serde_helpers::map_as_pairs", default)]
    pub copybook_file_symbols: SymbolMap,
    #[serde(skip)]
    pub last_modified_time: Option<SystemTime>,
    #[serde(skip)]
    pub is_dirty: bool,
}

/// Result of trying to refresh one table from disk.
enum LoadOutcome<T> {
    Missing,
    Unchanged,
    Loaded(T, Option<SystemTime>),
    Corrupt,
}

/// Both global tables, owned by the backend.
///
/// There is no internal locking; callers serialize writers.
#[derive(Debug, Default)]
pub struct GlobalCaches {
    symbols: GlobalSymbolTable,
    files: GlobalFileTable,
}

impl GlobalCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh both tables from `cache_dir`. Returns true if either was
    /// reloaded.
    pub fn load(&mut self, cache_dir: &Path) -> bool {
        let symbols = self.load_symbol_cache(cache_dir);
        let files = self.load_file_cache(cache_dir);
        symbols || files
    }

    pub fn load_symbol_cache(&mut self, cache_dir: &Path) -> bool {
        let path = cache_dir.join(SYMBOL_CACHE_FILE);
        match load_table::<GlobalSymbolTable>(&path, self.symbols.last_modified_time) {
            LoadOutcome::Loaded(mut table, mtime) => {
                table.last_modified_time = mtime;
                table.is_dirty = false;
                info!(
                    "Loaded global symbol cache: {} callable, {} class, {} method symbol(s)",
                    table.callable_symbols.len(),
                    table.class_symbols.len(),
                    table.method_symbols.len()
                );
                self.symbols = table;
                true
            }
            LoadOutcome::Missing | LoadOutcome::Unchanged | LoadOutcome::Corrupt => false,
        }
    }

    pub fn load_file_cache(&mut self, cache_dir: &Path) -> bool {
        let path = cache_dir.join(FILE_CACHE_FILE);
        match load_table::<GlobalFileTable>(&path, self.files.last_modified_time) {
            LoadOutcome::Loaded(mut table, mtime) => {
                table.last_modified_time = mtime;
                table.is_dirty = false;
                info!(
                    "Loaded global file cache: {} copybook file(s)",
                    table.copybook_file_symbols.len()
                );
                self.files = table;
                true
            }
            LoadOutcome::Missing | LoadOutcome::Unchanged | LoadOutcome::Corrupt => false,
        }
    }

    /// Write every dirty table to `cache_dir`.
    pub fn save(&mut self, cache_dir: &Path) -> Result<(), CacheError> {
        if self.symbols.is_dirty {
            let path = cache_dir.join(SYMBOL_CACHE_FILE);
            write_compressed_json(&path, &self.symbols)?;
            self.symbols.last_modified_time = modified_time(&path);
            self.symbols.is_dirty = false;
            debug!("Saved global symbol cache to {}", path.display());
        }
        if self.files.is_dirty {
            let path = cache_dir.join(FILE_CACHE_FILE);
            write_compressed_json(&path, &self.files)?;
            self.files.last_modified_time = modified_time(&path);
            self.files.is_dirty = false;
            debug!("Saved global file cache to {}", path.display());
        }
        Ok(())
    }

    /// Force both tables to be rewritten on the next save.
    pub fn touch(&mut self) {
        self.symbols.is_dirty = true;
        self.files.is_dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.symbols.is_dirty || self.files.is_dirty
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.files.copybook_file_symbols.is_empty()
    }

    pub fn add_symbol(&mut self, name: &str, filename: &str, lnum: u32) {
        let key = name.to_ascii_lowercase();
        if add_symbol_to_cache(&mut self.symbols.callable_symbols, key, filename, lnum) {
            self.symbols.is_dirty = true;
        }
    }

    pub fn add_class_symbol(&mut self, name: &str, filename: &str, lnum: u32) {
        let key = name.to_ascii_lowercase();
        if add_symbol_to_cache(&mut self.symbols.class_symbols, key, filename, lnum) {
            self.symbols.is_dirty = true;
        }
    }

    pub fn add_method_symbol(&mut self, name: &str, filename: &str, lnum: u32) {
        let key = name.to_ascii_lowercase();
        if add_symbol_to_cache(&mut self.symbols.method_symbols, key, filename, lnum) {
            self.symbols.is_dirty = true;
        }
    }

    /// Register a copybook file. The path is the key, kept as given.
    pub fn add_copybook_filename(&mut self, filename: &str) {
        let files = &mut self.files.copybook_file_symbols;
        if add_symbol_to_cache(files, filename.to_string(), filename, 0) {
            self.files.is_dirty = true;
        }
    }

    /// Drop every symbol definition recorded for `filename`, e.g. before
    /// re-indexing it. Returns true if anything was removed.
    pub fn remove_file_symbols(&mut self, filename: &str) -> bool {
        let mut removed = false;
        for map in [
            &mut self.symbols.callable_symbols,
            &mut self.symbols.class_symbols,
            &mut self.symbols.method_symbols,
        ] {
            removed |= remove_file_from_cache(map, filename);
        }
        if removed {
            self.symbols.is_dirty = true;
        }
        removed
    }

    /// Forget a file entirely: its symbol definitions and its copybook
    /// registration. Used for files deleted from the workspace.
    pub fn remove_file(&mut self, filename: &str) -> bool {
        let mut removed = self.remove_file_symbols(filename);
        if self.files.copybook_file_symbols.remove(filename).is_some() {
            self.files.is_dirty = true;
            removed = true;
        }
        removed
    }

    pub fn global_symbol_cache(&self) -> &GlobalSymbolTable {
        &self.symbols
    }

    pub fn global_file_cache(&self) -> &GlobalFileTable {
        &self.files
    }

    pub fn lookup_callable(&self, name: &str) -> &[CobolFileSymbol] {
        lookup(&self.symbols.callable_symbols, name)
    }

    pub fn lookup_class(&self, name: &str) -> &[CobolFileSymbol] {
        lookup(&self.symbols.class_symbols, name)
    }

    pub fn lookup_method(&self, name: &str) -> &[CobolFileSymbol] {
        lookup(&self.symbols.method_symbols, name)
    }
}

/// Record `(filename, lnum)` under `key`. Returns true if the map changed.
fn add_symbol_to_cache(map: &mut SymbolMap, key: String, filename: &str, lnum: u32) -> bool {
    let entries = map.entry(key).or_default();
    if entries
        .iter()
        .any(|s| s.lnum == lnum && s.filename == filename)
    {
        return false;
    }
    entries.push(CobolFileSymbol::new(filename, lnum));
    true
}

fn remove_file_from_cache(map: &mut SymbolMap, filename: &str) -> bool {
    let before: usize = map.values().map(Vec::len).sum();
    map.retain(|_, entries| {
        entries.retain(|s| s.filename != filename);
        !entries.is_empty()
    });
    let after: usize = map.values().map(Vec::len).sum();
    before != after
}

fn lookup<'a>(map: &'a SymbolMap, name: &str) -> &'a [CobolFileSymbol] {
    map.get(&name.to_ascii_lowercase())
        .map_or(&[], Vec::as_slice)
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn load_table<T: serde::de::DeserializeOwned>(
    path: &Path,
    last_modified_time: Option<SystemTime>,
) -> LoadOutcome<T> {
    let Ok(metadata) = fs::metadata(path) else {
        return LoadOutcome::Missing;
    };
    let mtime = metadata.modified().ok();
    if mtime.is_some() && mtime == last_modified_time {
        debug!("{} unchanged since last load", path.display());
        return LoadOutcome::Unchanged;
    }

    match read_compressed_json::<T>(path) {
        Ok(table) => LoadOutcome::Loaded(table, mtime),
        Err(e) => {
            warn!("Discarding unreadable cache file: {}", e);
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to delete {}: {}", path.display(), e);
            }
            LoadOutcome::Corrupt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;
    use tempfile::TempDir;

    #[test]
    fn test_add_symbol_is_case_insensitive_and_idempotent() {
        let mut caches = GlobalCaches::new();
        caches.add_symbol("PAYROLL", "/src/payroll.cbl", 2);
        assert!(caches.is_dirty());

        caches.symbols.is_dirty = false;
        caches.add_symbol("payroll", "/src/payroll.cbl", 2);
        assert!(!caches.is_dirty());
        assert_eq!(caches.lookup_callable("Payroll").len(), 1);
    }

    #[test]
    fn test_add_symbol_appends_distinct_definitions() {
        let mut caches = GlobalCaches::new();
        caches.add_symbol("PAYROLL", "/src/payroll.cbl", 2);
        caches.add_symbol("PAYROLL", "/src/payroll-v2.cbl", 5);

        assert_eq!(
            caches.lookup_callable("payroll"),
            &[
                CobolFileSymbol::new("/src/payroll.cbl", 2),
                CobolFileSymbol::new("/src/payroll-v2.cbl", 5),
            ]
        );
    }

    #[test]
    fn test_tables_are_independent() {
        let mut caches = GlobalCaches::new();
        caches.add_class_symbol("Account", "/src/account.cbl", 1);
        caches.add_method_symbol("Deposit", "/src/account.cbl", 9);
        caches.add_copybook_filename("/copy/WS-FIELDS.cpy");

        assert!(caches.lookup_callable("account").is_empty());
        assert_eq!(caches.lookup_class("ACCOUNT").len(), 1);
        assert_eq!(caches.lookup_method("deposit")[0].lnum, 9);
        let files = &caches.global_file_cache().copybook_file_symbols;
        assert_eq!(
            files.get("/copy/WS-FIELDS.cpy"),
            Some(&vec![CobolFileSymbol::new("/copy/WS-FIELDS.cpy", 0)])
        );
        assert!(caches.global_file_cache().is_dirty);
    }

    #[test]
    fn test_remove_file_drops_only_that_file() {
        let mut caches = GlobalCaches::new();
        caches.add_symbol("PAYROLL", "/src/a.cbl", 2);
        caches.add_symbol("PAYROLL", "/src/b.cbl", 3);
        caches.add_symbol("ONLY-A", "/src/a.cbl", 8);
        caches.symbols.is_dirty = false;

        assert!(caches.remove_file("/src/a.cbl"));
        assert!(caches.is_dirty());
        assert_eq!(caches.lookup_callable("payroll"), &[CobolFileSymbol::new("/src/b.cbl", 3)]);
        assert!(!caches.global_symbol_cache().callable_symbols.contains_key("only-a"));

        caches.symbols.is_dirty = false;
        assert!(!caches.remove_file("/src/a.cbl"));
        assert!(!caches.is_dirty());
    }

    #[test]
    fn test_remove_file_symbols_keeps_copybook_registration() {
        let mut caches = GlobalCaches::new();
        caches.add_symbol("DATES", "/copy/dates.cpy", 1);
        caches.add_copybook_filename("/copy/dates.cpy");

        assert!(caches.remove_file_symbols("/copy/dates.cpy"));
        assert!(caches.lookup_callable("dates").is_empty());
        assert!(caches.global_file_cache().copybook_file_symbols.contains_key("/copy/dates.cpy"));

        assert!(caches.remove_file("/copy/dates.cpy"));
        assert!(caches.global_file_cache().copybook_file_symbols.is_empty());
    }

    #[test]
    fn test_wire_format_uses_pairs_and_camel_case() {
        let mut caches = GlobalCaches::new();
        caches.add_symbol("PAYROLL", "/src/payroll.cbl", 2);

        let json = serde_json::to_value(caches.global_symbol_cache()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "callableSymbols": [["payroll", [{"filename": "/src/payroll.cbl", "lnum": 2}]]],
                "classSymbols": [],
                "methodSymbols": []
            })
        );
    }

    #[test]
    fn test_save_then_load_into_fresh_caches() {
        let temp_dir = TempDir::new().unwrap();
        let mut caches = GlobalCaches::new();
        caches.add_symbol("PAYROLL", "/src/payroll.cbl", 2);
        caches.add_copybook_filename("/copy/WS-FIELDS.cpy");
        caches.save(temp_dir.path()).unwrap();
        assert!(!caches.is_dirty());

        let mut fresh = GlobalCaches::new();
        assert!(fresh.load(temp_dir.path()));
        assert_eq!(fresh.lookup_callable("payroll").len(), 1);
        assert_eq!(fresh.global_file_cache().copybook_file_symbols.len(), 1);
        assert!(!fresh.is_dirty());

        // Unchanged on disk: second load is a no-op
        assert!(!fresh.load(temp_dir.path()));
    }

    #[test]
    fn test_load_missing_directory_is_false() {
        let temp_dir = TempDir::new().unwrap();
        let mut caches = GlobalCaches::new();
        assert!(!caches.load(&temp_dir.path().join("absent")));
        assert!(caches.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(SYMBOL_CACHE_FILE);
        fs::write(&path, b"definitely not zstd").unwrap();

        let mut caches = GlobalCaches::new();
        assert!(!caches.load_symbol_cache(temp_dir.path()));
        assert!(!path.exists());
        assert!(caches.global_symbol_cache().is_empty());
    }

    quickcheck! {
        fn prop_repeated_add_never_grows(name: String, file: String, lnum: u32, repeats: u8) -> bool {
            let mut caches = GlobalCaches::new();
            for _ in 0..=repeats {
                caches.add_symbol(&name, &file, lnum);
            }
            caches.lookup_callable(&name).len() == 1
        }
    }
}
