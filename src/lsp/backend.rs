use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use tower_lsp::Client;
use tower_lsp::lsp_types::{Location, MessageType, Position, Url};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigOverrides, ServerConfig};
use crate::lsp::features::references::{ReferenceResolver, word_at_position};
use crate::lsp::global_cache::GlobalCaches;
use crate::lsp::models::SymbolLocation;
use crate::source_handler::{BufferSourceHandler, FileSourceHandler, SourceHandler};

pub mod file_modification_tracker;
pub mod indexing;
pub mod persistent_cache;
pub mod symbols;

mod handlers;
mod state;

pub use state::CobolBackend;

use file_modification_tracker::FileModificationTracker;
use indexing::{index_source, index_workspace, parse_for_index};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryKind {
    References,
    Definitions,
}

impl CobolBackend {
    /// Creates a backend for `client`. Command-line `overrides` take
    /// precedence over anything the client sends in `initialize`.
    pub fn new(client: Client, overrides: ConfigOverrides) -> Self {
        let mut config = ServerConfig::default();
        config.apply_env();
        config.apply_overrides(&overrides);

        Self {
            client,
            documents_by_uri: Arc::new(DashMap::new()),
            serial_document_id: Arc::new(AtomicU32::new(0)),
            overrides: Arc::new(overrides),
            config: Arc::new(RwLock::new(config)),
            caches: Arc::new(RwLock::new(GlobalCaches::new())),
            root_dir: Arc::new(RwLock::new(None)),
            cache_dir: Arc::new(RwLock::new(None)),
            tracker: Arc::new(tokio::sync::RwLock::new(None)),
        }
    }

    fn next_document_id(&self) -> u32 {
        self.serial_document_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Source text for a query: the open buffer when there is one, otherwise
    /// the file on disk.
    async fn source_for(&self, uri: &Url) -> Option<Box<dyn SourceHandler>> {
        let path = uri.to_file_path().ok();
        let filename = path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| uri.to_string());

        let document = self.documents_by_uri.get(uri).map(|r| r.value().clone());
        if let Some(document) = document {
            let rope = document.rope().await;
            return Some(Box::new(BufferSourceHandler::new(filename, rope)));
        }

        let path = path?;
        match tokio::task::spawn_blocking(move || FileSourceHandler::open(&path)).await {
            Ok(Ok(source)) => Some(Box::new(source)),
            Ok(Err(e)) => {
                warn!("Failed to read {}: {}", uri, e);
                None
            }
            Err(e) => {
                error!("Read task for {} failed: {}", uri, e);
                None
            }
        }
    }

    /// Run a reference or definition query off the protocol loop.
    ///
    /// Returns the word under the cursor alongside the results so callers can
    /// fall back to the global cache.
    async fn query(
        &self,
        uri: &Url,
        position: Position,
        kind: QueryKind,
    ) -> (Option<String>, Option<Vec<SymbolLocation>>) {
        let Some(source) = self.source_for(uri).await else {
            return (None, None);
        };
        let config = self.config.read().clone();

        let task = tokio::task::spawn_blocking(move || {
            let parser_config = config.parser_configuration();
            let copybooks = config.copybook_resolver();
            let resolver = ReferenceResolver::new(&parser_config, &copybooks);
            let word = word_at_position(source.as_ref(), position.line, position.character);
            let found = match kind {
                QueryKind::References => {
                    resolver.find_references(source.as_ref(), position.line, position.character)
                }
                QueryKind::Definitions => {
                    resolver.find_definitions(source.as_ref(), position.line, position.character)
                }
            };
            (word, found)
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!("{:?} query for {} failed: {}", kind, uri, e);
                (None, None)
            }
        }
    }

    fn to_locations(found: Vec<SymbolLocation>) -> Vec<Location> {
        found.iter().filter_map(SymbolLocation::to_lsp_location).collect()
    }

    /// Load persisted caches, then bring them up to date with the workspace.
    async fn start_workspace(&self) {
        let Some(cache_dir) = self.cache_dir.read().clone() else {
            warn!("No cache directory; global symbol cache disabled");
            return;
        };

        match FileModificationTracker::with_cache_dir(cache_dir.clone()).await {
            Ok(tracker) => *self.tracker.write().await = Some(tracker),
            Err(e) => warn!("Failed to open file timestamp cache in {}: {}", cache_dir.display(), e),
        }

        let caches = Arc::clone(&self.caches);
        let dir = cache_dir.clone();
        match tokio::task::spawn_blocking(move || caches.write().load(&dir)).await {
            Ok(true) => info!("Loaded global caches from {}", cache_dir.display()),
            Ok(false) => debug!("No global caches loaded from {}", cache_dir.display()),
            Err(e) => error!("Cache load task failed: {}", e),
        }

        let config = self.config.read().clone();
        let root = self.root_dir.read().clone();
        let Some(root) = root.filter(|_| config.scan_workspace) else {
            return;
        };
        let Some(tracker) = self.tracker.read().await.clone() else {
            return;
        };

        match index_workspace(root, config, Arc::clone(&self.caches), &tracker, cache_dir).await {
            Ok(stats) => {
                self.client
                    .log_message(
                        MessageType::INFO,
                        format!(
                            "COBOL index ready: {} file(s), {} re-parsed",
                            stats.scanned, stats.indexed
                        ),
                    )
                    .await;
            }
            Err(e) => error!("Workspace indexing failed: {:#}", e),
        }
    }

    /// Re-index one saved file into the global caches and save them.
    async fn reindex_document(&self, uri: &Url) {
        let Ok(path) = uri.to_file_path() else {
            return;
        };
        let config = self.config.read().clone();
        if !config.is_source_file(&path) {
            return;
        }
        let Some(cache_dir) = self.cache_dir.read().clone() else {
            return;
        };
        let Some(source) = self.source_for(uri).await else {
            return;
        };

        let caches = Arc::clone(&self.caches);
        let task = tokio::task::spawn_blocking(move || {
            let indexed = parse_for_index(
                source.as_ref(),
                &config.parser_configuration(),
                &config.copybook_resolver(),
            );
            let mut caches = caches.write();
            index_source(&mut caches, &indexed);
            caches.save(&cache_dir)
        });

        match task.await {
            Ok(Ok(())) => debug!("Re-indexed {}", path.display()),
            Ok(Err(e)) => warn!("Failed to save global caches after re-indexing {}: {}", path.display(), e),
            Err(e) => error!("Re-index task for {} failed: {}", path.display(), e),
        }

        if let Some(tracker) = self.tracker.read().await.as_ref() {
            if let Err(e) = tracker.mark_indexed(&path).await {
                debug!("Failed to record timestamp for {}: {}", path.display(), e);
            }
        }
    }

    /// Flush dirty cache tables and file timestamps.
    async fn persist_caches(&self) {
        let cache_dir = self.cache_dir.read().clone();
        if let Some(cache_dir) = cache_dir {
            let caches = Arc::clone(&self.caches);
            match tokio::task::spawn_blocking(move || caches.write().save(&cache_dir)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Failed to save global caches: {}", e),
                Err(e) => error!("Cache save task failed: {}", e),
            }
        }
        if let Some(tracker) = self.tracker.read().await.as_ref() {
            if let Err(e) = tracker.persist().await {
                warn!("Failed to persist file timestamps: {}", e);
            }
        }
    }

    /// Workspace root from the initialize request: the first workspace
    /// folder, else the deprecated root URI.
    fn workspace_root(params: &tower_lsp::lsp_types::InitializeParams) -> Option<PathBuf> {
        let from_folders = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|folder| folder.uri.to_file_path().ok());

        #[allow(deprecated)]
        let from_root_uri = params.root_uri.as_ref().and_then(|uri| uri.to_file_path().ok());

        from_folders.or(from_root_uri)
    }

    fn set_workspace(&self, root: Option<&Path>, config: ServerConfig) {
        let cache_dir = match config.resolve_cache_dir(root) {
            Ok(dir) => Some(dir),
            Err(e) => {
                warn!("Cannot determine cache directory: {:#}", e);
                None
            }
        };
        info!(
            "Workspace root: {:?}, cache directory: {:?}",
            root, cache_dir
        );
        *self.root_dir.write() = root.map(Path::to_path_buf);
        *self.cache_dir.write() = cache_dir;
        *self.config.write() = config;
    }
}
