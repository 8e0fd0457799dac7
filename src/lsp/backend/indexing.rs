//! Workspace indexing for the global symbol cache
//!
//! This module contains:
//! - Per-file extraction of callable, class and method names plus the
//!   copybook files each unit pulls in
//! - Merging that extraction into [`GlobalCaches`]
//! - Directory-wide incremental indexing, using the file modification
//!   tracker to skip unchanged files and Rayon to parse in parallel

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::ServerConfig;
use crate::lsp::copybook::CopybookResolver;
use crate::lsp::global_cache::GlobalCaches;
use crate::parsers::cobol::{ParserConfiguration, QuickParse, SourceReferences};
use crate::source_handler::{FileSourceHandler, SourceHandler};

use super::file_modification_tracker::FileModificationTracker;

/// What one source file contributes to the global cache.
#[derive(Debug)]
pub struct IndexedSource {
    pub filename: String,
    pub unit: QuickParse,
    /// Resolved copybook files, in first-reference order.
    pub copybooks: Vec<PathBuf>,
}

/// Counts reported after a workspace pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub scanned: usize,
    pub indexed: usize,
    pub removed: usize,
}

/// Parse `source` and resolve the copybooks it names.
///
/// Unresolvable copybooks are left out.
pub fn parse_for_index(
    source: &dyn SourceHandler,
    config: &ParserConfiguration,
    resolver: &dyn CopybookResolver,
) -> IndexedSource {
    let filename = source.filename().to_string();
    // References are not needed for the global cache
    let mut refs = SourceReferences::new();
    let unit = QuickParse::parse(source, &filename, config, &mut refs);

    let referencing = Path::new(&filename);
    let mut copybooks = Vec::new();
    for name in &unit.copybooks_used {
        match resolver.resolve(name, referencing) {
            Ok(Some(path)) if !copybooks.contains(&path) => copybooks.push(path),
            Ok(Some(_)) => {}
            Ok(None) => debug!("Copybook {} not found for {}", name, filename),
            Err(e) => warn!("Failed to resolve copybook {} for {}: {:#}", name, filename, e),
        }
    }

    IndexedSource {
        filename,
        unit,
        copybooks,
    }
}

/// Replace whatever `caches` held for this file with the new extraction.
pub fn index_source(caches: &mut GlobalCaches, indexed: &IndexedSource) {
    let filename = indexed.filename.as_str();
    caches.remove_file_symbols(filename);

    let unit = &indexed.unit;
    for token in unit.program_ids.iter().chain(&unit.entry_points) {
        caches.add_symbol(&token.name, filename, token.start_line);
    }
    for token in &unit.class_ids {
        caches.add_class_symbol(&token.name, filename, token.start_line);
    }
    for token in &unit.method_ids {
        caches.add_method_symbol(&token.name, filename, token.start_line);
    }
    for copybook in &indexed.copybooks {
        caches.add_copybook_filename(&copybook.to_string_lossy());
    }
}

/// Every COBOL source under `root`, skipping hidden directories.
pub fn collect_sources(root: &Path, config: &ServerConfig) -> Vec<PathBuf> {
    fn is_hidden(entry: &DirEntry) -> bool {
        entry.depth() > 0 && entry.file_name().to_str().is_some_and(|n| n.starts_with('.'))
    }

    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && config.is_source_file(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// Incrementally index `root` into `caches` and save them to `cache_dir`.
///
/// When the caches are empty (first run or lost cache files) every file is
/// parsed regardless of the tracker.
pub async fn index_workspace(
    root: PathBuf,
    config: ServerConfig,
    caches: Arc<RwLock<GlobalCaches>>,
    tracker: &FileModificationTracker,
    cache_dir: PathBuf,
) -> Result<IndexStats> {
    let force = caches.read().is_empty();

    let walk_config = config.clone();
    let files = tokio::task::spawn_blocking(move || collect_sources(&root, &walk_config))
        .await
        .context("workspace walk panicked")?;

    let mut stats = IndexStats {
        scanned: files.len(),
        ..IndexStats::default()
    };

    let mut changed = Vec::new();
    for path in files {
        if force || tracker.has_changed(&path).await.unwrap_or(true) {
            changed.push(path);
        }
    }
    debug!(
        "{} of {} source file(s) need indexing (force: {})",
        changed.len(),
        stats.scanned,
        force
    );

    let missing = tracker.missing_files();
    for path in &missing {
        tracker.remove(path);
    }
    stats.removed = missing.len();

    let parsed = {
        let caches = Arc::clone(&caches);
        tokio::task::spawn_blocking(move || -> Result<Vec<IndexedSource>> {
            let parser_config = config.parser_configuration();
            let resolver = config.copybook_resolver();

            let parsed: Vec<IndexedSource> = changed
                .par_iter()
                .filter_map(|path| match FileSourceHandler::open(path) {
                    Ok(source) => Some(parse_for_index(&source, &parser_config, &resolver)),
                    Err(e) => {
                        warn!("Skipping unreadable source {}: {}", path.display(), e);
                        None
                    }
                })
                .collect();

            let mut caches = caches.write();
            for path in &missing {
                caches.remove_file(&path.to_string_lossy());
            }
            for indexed in &parsed {
                index_source(&mut caches, indexed);
            }
            caches
                .save(&cache_dir)
                .with_context(|| format!("Failed to save global caches to {}", cache_dir.display()))?;
            Ok(parsed)
        })
        .await
        .context("indexing task panicked")??
    };

    stats.indexed = parsed.len();

    for indexed in &parsed {
        if let Err(e) = tracker.mark_indexed(Path::new(&indexed.filename)).await {
            warn!("Failed to record timestamp for {}: {}", indexed.filename, e);
        }
    }
    tracker
        .persist()
        .await
        .context("Failed to persist file timestamps")?;

    info!(
        "Indexed workspace: {} scanned, {} parsed, {} removed",
        stats.scanned, stats.indexed, stats.removed
    );
    Ok(stats)
}
