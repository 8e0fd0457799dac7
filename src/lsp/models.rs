use std::path::PathBuf;

use ropey::Rope;

use tower_lsp::lsp_types::{Location, Position, Range, TextDocumentContentChangeEvent, Url};

/// Changes associated with a specific version of the document.
#[derive(Debug)]
pub struct VersionedChanges {
    pub version: i32,
    pub changes: Vec<TextDocumentContentChangeEvent>,
}

/// State for an open text document managed by the LSP server.
#[derive(Debug)]
pub struct LspDocumentState {
    pub uri: Url,
    pub text: Rope,
    pub version: i32,
    pub history: LspDocumentHistory,
}

/// Text at open time plus every change applied since.
#[derive(Debug)]
pub struct LspDocumentHistory {
    pub text: String,
    pub changes: Vec<VersionedChanges>,
}

/// LSP document with state for open files.
#[derive(Debug)]
pub struct LspDocument {
    pub id: u32,
    pub state: tokio::sync::RwLock<LspDocumentState>,
}

/// A symbol occurrence returned by reference and definition queries.
///
/// Lines and columns are zero-based character positions. `length` is the
/// symbol name length so a protocol range can be built from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolLocation {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
    pub length: u32,
}

impl SymbolLocation {
    pub fn new(path: impl Into<PathBuf>, line: u32, column: u32, length: u32) -> Self {
        Self {
            path: path.into(),
            line,
            column,
            length,
        }
    }

    /// Protocol form of this location. `None` for paths that cannot be
    /// expressed as a `file://` URL.
    pub fn to_lsp_location(&self) -> Option<Location> {
        let uri = Url::from_file_path(&self.path).ok()?;
        Some(Location {
            uri,
            range: Range {
                start: Position::new(self.line, self.column),
                end: Position::new(self.line, self.column + self.length),
            },
        })
    }
}
