//! Integration tests for incremental workspace indexing
//!
//! Covers the full flow used at server startup: walk the workspace, re-parse
//! only files whose modification time moved, drop deleted files, and persist
//! both the global caches and the file timestamps so a restart starts warm.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use indoc::formatdoc;
use parking_lot::RwLock;
use tempfile::TempDir;

use cobol_language_server::config::ServerConfig;
use cobol_language_server::lsp::backend::file_modification_tracker::FileModificationTracker;
use cobol_language_server::lsp::backend::indexing::{IndexStats, index_workspace};
use cobol_language_server::lsp::global_cache::{FILE_CACHE_FILE, GlobalCaches, SYMBOL_CACHE_FILE};

/// A fixed-format program. `formatdoc!` strips the common indent, so the
/// sequence area is added back explicitly.
fn program(name: &str) -> String {
    formatdoc! {"
        IDENTIFICATION DIVISION.
        PROGRAM-ID. {name}.
        DATA DIVISION.
        WORKING-STORAGE SECTION.
        COPY WS-FIELDS.
        PROCEDURE DIVISION.
            STOP RUN.
    "}
    .lines()
    .map(|line| format!("       {}\n", line))
    .collect()
}

struct Fixture {
    _root: TempDir,
    _cache: TempDir,
    root: PathBuf,
    cache_dir: PathBuf,
    config: ServerConfig,
}

impl Fixture {
    fn new() -> Self {
        let root_dir = TempDir::new().expect("Failed to create workspace dir");
        let cache = TempDir::new().expect("Failed to create cache dir");
        let root = root_dir.path().to_path_buf();

        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("copy")).unwrap();
        fs::write(root.join("src/payroll.cbl"), program("PAYROLL")).unwrap();
        fs::write(root.join("src/ledger.cbl"), program("LEDGER")).unwrap();
        fs::write(
            root.join("copy/WS-FIELDS.cpy"),
            "       01  WS-COUNT  PIC 9(4).\n",
        )
        .unwrap();

        let config = ServerConfig {
            copybook_directories: vec![root.join("copy")],
            ..ServerConfig::default()
        };

        Self {
            cache_dir: cache.path().join("workspace"),
            _root: root_dir,
            _cache: cache,
            root,
            config,
        }
    }

    async fn tracker(&self) -> FileModificationTracker {
        FileModificationTracker::with_cache_dir(self.cache_dir.clone())
            .await
            .expect("tracker")
    }

    async fn index(
        &self,
        caches: &Arc<RwLock<GlobalCaches>>,
        tracker: &FileModificationTracker,
    ) -> IndexStats {
        index_workspace(
            self.root.clone(),
            self.config.clone(),
            Arc::clone(caches),
            tracker,
            self.cache_dir.clone(),
        )
        .await
        .expect("indexing")
    }
}

/// Rewrite a file and move its modification time forward so the change is
/// visible regardless of filesystem timestamp granularity.
fn rewrite(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
}

#[tokio::test]
async fn test_first_run_indexes_everything() {
    let fx = Fixture::new();
    let caches = Arc::new(RwLock::new(GlobalCaches::new()));
    let tracker = fx.tracker().await;

    let stats = fx.index(&caches, &tracker).await;

    assert_eq!(
        stats,
        IndexStats {
            scanned: 3,
            indexed: 3,
            removed: 0
        }
    );
    let caches = caches.read();
    let payroll = fx.root.join("src/payroll.cbl");
    assert_eq!(
        caches.lookup_callable("payroll")[0].filename,
        payroll.to_string_lossy()
    );
    assert_eq!(caches.lookup_callable("ledger")[0].lnum, 1);
    assert!(
        caches
            .global_file_cache()
            .copybook_file_symbols
            .contains_key(fx.root.join("copy/WS-FIELDS.cpy").to_string_lossy().as_ref())
    );
    assert!(fx.cache_dir.join(SYMBOL_CACHE_FILE).exists());
    assert_eq!(tracker.len(), 3);
}

#[tokio::test]
async fn test_unchanged_files_are_skipped() {
    let fx = Fixture::new();
    let caches = Arc::new(RwLock::new(GlobalCaches::new()));
    let tracker = fx.tracker().await;
    fx.index(&caches, &tracker).await;

    let stats = fx.index(&caches, &tracker).await;

    assert_eq!(stats.scanned, 3);
    assert_eq!(stats.indexed, 0);
    assert_eq!(caches.read().lookup_callable("payroll").len(), 1);
}

#[tokio::test]
async fn test_modified_file_is_reparsed() {
    let fx = Fixture::new();
    let caches = Arc::new(RwLock::new(GlobalCaches::new()));
    let tracker = fx.tracker().await;
    fx.index(&caches, &tracker).await;

    rewrite(&fx.root.join("src/ledger.cbl"), &program("LEDGERX"));
    let stats = fx.index(&caches, &tracker).await;

    assert_eq!(stats.indexed, 1);
    let caches = caches.read();
    assert!(caches.lookup_callable("ledger").is_empty());
    assert_eq!(caches.lookup_callable("ledgerx").len(), 1);
    assert_eq!(caches.lookup_callable("payroll").len(), 1);
}

#[tokio::test]
async fn test_deleted_file_is_removed() {
    let fx = Fixture::new();
    let caches = Arc::new(RwLock::new(GlobalCaches::new()));
    let tracker = fx.tracker().await;
    fx.index(&caches, &tracker).await;

    let ledger = fx.root.join("src/ledger.cbl");
    fs::remove_file(&ledger).unwrap();
    let stats = fx.index(&caches, &tracker).await;

    assert_eq!(
        stats,
        IndexStats {
            scanned: 2,
            indexed: 0,
            removed: 1
        }
    );
    assert!(caches.read().lookup_callable("ledger").is_empty());
    assert!(tracker.get_cached_time(&ledger).is_none());
}

#[tokio::test]
async fn test_restart_starts_warm() {
    let fx = Fixture::new();
    {
        let caches = Arc::new(RwLock::new(GlobalCaches::new()));
        let tracker = fx.tracker().await;
        fx.index(&caches, &tracker).await;
    }

    // A new server process: caches and timestamps come from disk
    let caches = Arc::new(RwLock::new(GlobalCaches::new()));
    assert!(caches.write().load(&fx.cache_dir));
    let tracker = fx.tracker().await;
    assert_eq!(tracker.len(), 3);

    let stats = fx.index(&caches, &tracker).await;
    assert_eq!(stats.indexed, 0);
    assert_eq!(caches.read().lookup_callable("payroll").len(), 1);
}

#[tokio::test]
async fn test_lost_caches_force_full_reindex() {
    let fx = Fixture::new();
    {
        let caches = Arc::new(RwLock::new(GlobalCaches::new()));
        let tracker = fx.tracker().await;
        fx.index(&caches, &tracker).await;
    }
    fs::remove_file(fx.cache_dir.join(SYMBOL_CACHE_FILE)).unwrap();
    fs::remove_file(fx.cache_dir.join(FILE_CACHE_FILE)).unwrap();

    // Timestamps survived, but an empty cache must not trust them
    let caches = Arc::new(RwLock::new(GlobalCaches::new()));
    let tracker = fx.tracker().await;
    let stats = fx.index(&caches, &tracker).await;

    assert_eq!(stats.indexed, 3);
    assert_eq!(caches.read().lookup_callable("ledger").len(), 1);
}
