//! Backend state management
//!
//! This module defines the CobolBackend struct, which holds all state for
//! the LSP server: open documents, effective configuration and the global
//! symbol cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;

use dashmap::DashMap;
use parking_lot::RwLock;
use tower_lsp::Client;
use tower_lsp::lsp_types::Url;

use crate::config::{ConfigOverrides, ServerConfig};
use crate::lsp::global_cache::GlobalCaches;
use crate::lsp::models::LspDocument;

use super::file_modification_tracker::FileModificationTracker;

/// The COBOL language server backend, managing state and handling LSP requests.
#[derive(Clone)]
pub struct CobolBackend {
    pub(super) client: Client,
    pub(super) documents_by_uri: Arc<DashMap<Url, Arc<LspDocument>>>,
    pub(super) serial_document_id: Arc<AtomicU32>,
    /// Command-line settings, re-applied on top of `initializationOptions`
    pub(super) overrides: Arc<ConfigOverrides>,
    pub(super) config: Arc<RwLock<ServerConfig>>,
    /// Shared with the indexer; the only writers are indexing and save paths
    pub(super) caches: Arc<RwLock<GlobalCaches>>,
    pub(super) root_dir: Arc<RwLock<Option<PathBuf>>>,
    pub(super) cache_dir: Arc<RwLock<Option<PathBuf>>>,
    /// Created during `initialize`, once the cache directory is known
    pub(super) tracker: Arc<tokio::sync::RwLock<Option<FileModificationTracker>>>,
}

impl std::fmt::Debug for CobolBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CobolBackend")
            .field("documents_count", &self.documents_by_uri.len())
            .field("root_dir", &*self.root_dir.read())
            .field("cache_dir", &*self.cache_dir.read())
            .finish()
    }
}
