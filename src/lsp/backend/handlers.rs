//! LSP protocol handler implementations
//!
//! This module contains the `tower_lsp::LanguageServer` implementation for
//! the COBOL backend:
//! - Lifecycle handlers (initialize, initialized, shutdown)
//! - Document lifecycle (did_open, did_change, did_save, did_close)
//! - Navigation handlers (goto_definition, references)
//! - Workspace symbol search over the global cache

use std::sync::Arc;

use tower_lsp::jsonrpc::Result as LspResult;
use tower_lsp::lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, GotoDefinitionParams, GotoDefinitionResponse, InitializeParams,
    InitializeResult, InitializedParams, Location, OneOf, ReferenceParams, ServerCapabilities,
    ServerInfo, SymbolInformation, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, TextDocumentSyncSaveOptions, WorkspaceSymbolParams,
};
use tower_lsp::{LanguageServer, jsonrpc};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::lsp::models::LspDocument;

use super::state::CobolBackend;
use super::symbols::{callable_locations, workspace_symbols};
use super::QueryKind;

#[tower_lsp::async_trait]
impl LanguageServer for CobolBackend {
    /// Handles the LSP initialize request: merges configuration and declares capabilities.
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        info!("Received initialize from {:?}", params.client_info.as_ref().map(|c| &c.name));

        let config = ServerConfig::resolve(params.initialization_options.as_ref(), &self.overrides);
        let root = Self::workspace_root(&params);
        self.set_workspace(root.as_deref(), config);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::INCREMENTAL),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    /// Loads the persisted caches and starts the workspace scan in the background.
    async fn initialized(&self, _: InitializedParams) {
        info!("Initialized");
        let backend = self.clone();
        tokio::spawn(async move {
            backend.start_workspace().await;
        });
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        info!("Received shutdown request");
        self.persist_caches().await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        info!("Opening document: URI={}, version={}", document.uri, document.version);

        let id = self.next_document_id();
        let lsp_document = Arc::new(LspDocument::new(
            id,
            document.uri.clone(),
            &document.text,
            document.version,
        ));
        self.documents_by_uri.insert(document.uri, lsp_document);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        debug!("textDocument/didChange: {} v{}", uri, version);

        let document = self.documents_by_uri.get(&uri).map(|r| r.value().clone());
        match document {
            Some(document) => {
                if document.apply(params.content_changes, version).await.is_none() {
                    warn!("Failed to apply changes to document with URI={}", uri);
                }
            }
            None => warn!("Failed to find document with URI={}", uri),
        }
    }

    /// Re-indexes the saved file so the global cache reflects it.
    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        debug!("textDocument/didSave: {}", params.text_document.uri);
        self.reindex_document(&params.text_document.uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some((_, document)) = self.documents_by_uri.remove(&uri) {
            info!("Closed document: {}, id: {}", uri, document.id);
        } else {
            warn!("Failed to find document with URI={}", uri);
        }
    }

    /// Finds every definition and reference of the symbol under the cursor,
    /// across the document and the copybooks it includes.
    async fn references(&self, params: ReferenceParams) -> LspResult<Option<Vec<Location>>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        debug!("references request for {} at {:?}", uri, position);

        let (_, found) = self.query(&uri, position, QueryKind::References).await;
        Ok(found.map(Self::to_locations).filter(|l| !l.is_empty()))
    }

    /// Goes to the declaration of a paragraph, section or data item. Names
    /// with no local declaration are looked up as programs in the global cache.
    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> LspResult<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        debug!("goto_definition request for {} at {:?}", uri, position);

        let (word, found) = self.query(&uri, position, QueryKind::Definitions).await;
        let mut locations = found.map(Self::to_locations).unwrap_or_default();

        if locations.is_empty() {
            if let Some(word) = word {
                locations = callable_locations(&self.caches.read(), &word);
                debug!("{} global definition(s) for '{}'", locations.len(), word);
            }
        }

        Ok((!locations.is_empty()).then(|| GotoDefinitionResponse::Array(locations)))
    }

    /// Searches the global symbol cache.
    async fn symbol(&self, params: WorkspaceSymbolParams) -> LspResult<Option<Vec<SymbolInformation>>> {
        debug!("Handling workspace symbol request with query '{}'", params.query);
        let symbols = workspace_symbols(&self.caches.read(), &params.query);
        debug!("Found {} matching workspace symbols", symbols.len());
        Ok(Some(symbols))
    }
}
