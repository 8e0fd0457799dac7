use std::cmp::Ordering;

use ropey::Rope;

use tower_lsp::lsp_types::{Position, TextDocumentContentChangeEvent, Url};

pub use crate::lsp::models::{LspDocument, LspDocumentHistory, LspDocumentState, VersionedChanges};

/// Converts an LSP position to a char offset in the Rope, clamped to the text.
fn position_to_char_offset(position: &Position, text: &Rope) -> usize {
    let line = (position.line as usize).min(text.len_lines().saturating_sub(1));
    let line_start = text.line_to_char(line);
    let line_len = text.line(line).len_chars();
    line_start + (position.character as usize).min(line_len)
}

impl PartialEq for VersionedChanges {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for VersionedChanges {}

impl PartialOrd for VersionedChanges {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionedChanges {
    fn cmp(&self, other: &Self) -> Ordering {
        other.version.cmp(&self.version)
    }
}

impl LspDocumentState {
    pub fn new(uri: Url, text: &str, version: i32) -> Self {
        Self {
            uri,
            text: Rope::from_str(text),
            version,
            history: LspDocumentHistory {
                text: text.to_string(),
                changes: vec![],
            },
        }
    }

    /// Applies a list of content changes, returning the updated text if the
    /// version is newer, otherwise an error.
    pub fn apply(
        &mut self,
        changes: Vec<TextDocumentContentChangeEvent>,
        version: i32,
    ) -> Result<Rope, String> {
        if version <= self.version {
            return Err(format!("Version {} not newer than {}", version, self.version));
        }
        for change in &changes {
            if let Some(range) = change.range {
                let start = position_to_char_offset(&range.start, &self.text);
                let end = position_to_char_offset(&range.end, &self.text).max(start);
                self.text.remove(start..end);
                self.text.insert(start, &change.text);
            } else {
                self.text = Rope::from_str(&change.text);
            }
        }
        self.history.changes.push(VersionedChanges { version, changes });
        self.version = version;
        Ok(self.text.clone())
    }
}

impl LspDocument {
    pub fn new(id: u32, uri: Url, text: &str, version: i32) -> Self {
        Self {
            id,
            state: tokio::sync::RwLock::new(LspDocumentState::new(uri, text, version)),
        }
    }

    pub async fn uri(&self) -> Url {
        self.state.read().await.uri.clone()
    }

    pub async fn text(&self) -> String {
        self.state.read().await.text.to_string()
    }

    /// Snapshot of the current text. Cloning a rope is cheap.
    pub async fn rope(&self) -> Rope {
        self.state.read().await.text.clone()
    }

    pub async fn version(&self) -> i32 {
        self.state.read().await.version
    }

    pub async fn num_lines(&self) -> usize {
        self.state.read().await.text.len_lines()
    }

    /// Applies changes to the document, returning the new text.
    pub async fn apply(
        &self,
        changes: Vec<TextDocumentContentChangeEvent>,
        version: i32,
    ) -> Option<Rope> {
        let mut state = self.state.write().await;
        state.apply(changes, version).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_lsp::lsp_types::Range;

    fn create_test_document(text: &str) -> Arc<LspDocument> {
        Arc::new(LspDocument::new(
            1,
            Url::parse("file:///src/prog.cbl").unwrap(),
            text,
            0,
        ))
    }

    fn edit(start: (u32, u32), end: (u32, u32), text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: Some(Range {
                start: Position::new(start.0, start.1),
                end: Position::new(end.0, end.1),
            }),
            range_length: None,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_apply_full_change() {
        let doc = create_test_document("       MAIN-PARA.");
        let changes = vec![TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "       INIT-PARA.".to_string(),
        }];

        let result = doc.apply(changes, 1).await.map(|text| text.to_string());
        assert_eq!(result.as_deref(), Some("       INIT-PARA."));
        assert_eq!(doc.version().await, 1);
    }

    #[tokio::test]
    async fn test_apply_incremental_changes_in_order() {
        let doc = create_test_document("           MOVE WS-A TO WS-B.\n");
        let changes = vec![
            edit((0, 25), (0, 29), "WS-TOTAL"),
            edit((0, 16), (0, 20), "WS-COUNT"),
        ];

        let result = doc.apply(changes, 1).await.map(|text| text.to_string());
        assert_eq!(result.as_deref(), Some("           MOVE WS-COUNT TO WS-TOTAL.\n"));
    }

    #[tokio::test]
    async fn test_apply_clamps_out_of_range_positions() {
        let doc = create_test_document("       STOP RUN.");
        let result = doc
            .apply(vec![edit((0, 16), (5, 99), "\n       GOBACK.")], 1)
            .await
            .map(|text| text.to_string());
        assert_eq!(result.as_deref(), Some("       STOP RUN.\n       GOBACK."));
    }

    #[tokio::test]
    async fn test_apply_outdated_version() {
        let doc = create_test_document("       MAIN-PARA.");
        let changes = vec![TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "       NEW-PARA.".to_string(),
        }];

        assert!(doc.apply(changes.clone(), 1).await.is_some());
        assert!(doc.apply(changes, 1).await.is_none());
        assert_eq!(doc.text().await, "       NEW-PARA.");
        assert_eq!(doc.version().await, 1);
    }
}
