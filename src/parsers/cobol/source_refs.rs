//! Shared reference accumulator for one query
//!
//! Every unit parsed during a query (the root program plus the copybooks it
//! pulls in) appends its reference sites here. File paths are interned into
//! `filenames` so each reference only carries an index.

use std::collections::HashMap;

/// A reference occurrence of a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReference {
    /// Case-folded symbol name.
    pub name: String,
    /// Index into [`SourceReferences::filenames`] of the index that recorded it.
    pub file_id: usize,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Default)]
pub struct SourceReferences {
    pub filenames: Vec<String>,
    /// Paragraph/section references (PERFORM, GO TO, THRU targets).
    pub target_references: HashMap<String, Vec<SourceReference>>,
    /// Data-name references.
    pub constants_or_variables_references: HashMap<String, Vec<SourceReference>>,
}

impl SourceReferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a filename, returning its index. Registering the same path again
    /// returns the existing index.
    pub fn register_filename(&mut self, filename: &str) -> usize {
        if let Some(id) = self.filenames.iter().position(|f| f == filename) {
            return id;
        }
        self.filenames.push(filename.to_string());
        self.filenames.len() - 1
    }

    pub fn filename(&self, file_id: usize) -> Option<&str> {
        self.filenames.get(file_id).map(String::as_str)
    }

    pub fn add_target_reference(&mut self, name: &str, file_id: usize, line: u32, column: u32) {
        Self::push(&mut self.target_references, name, file_id, line, column);
    }

    pub fn add_variable_reference(&mut self, name: &str, file_id: usize, line: u32, column: u32) {
        Self::push(&mut self.constants_or_variables_references, name, file_id, line, column);
    }

    pub fn target_references_for(&self, name: &str) -> &[SourceReference] {
        self.target_references
            .get(&name.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    pub fn variable_references_for(&self, name: &str) -> &[SourceReference] {
        self.constants_or_variables_references
            .get(&name.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    fn push(
        map: &mut HashMap<String, Vec<SourceReference>>,
        name: &str,
        file_id: usize,
        line: u32,
        column: u32,
    ) {
        let name = name.to_ascii_lowercase();
        map.entry(name.clone()).or_default().push(SourceReference {
            name,
            file_id,
            line,
            column,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_filename_deduplicates() {
        let mut refs = SourceReferences::new();
        let a = refs.register_filename("/src/prog.cbl");
        let b = refs.register_filename("/src/fields.cpy");
        assert_eq!(refs.register_filename("/src/prog.cbl"), a);
        assert_ne!(a, b);
        assert_eq!(refs.filenames.len(), 2);
        assert_eq!(refs.filename(b), Some("/src/fields.cpy"));
        assert_eq!(refs.filename(7), None);
    }

    #[test]
    fn test_references_keep_recording_order() {
        let mut refs = SourceReferences::new();
        let file = refs.register_filename("/src/prog.cbl");
        refs.add_variable_reference("WS-COUNT", file, 10, 18);
        refs.add_variable_reference("ws-count", file, 4, 11);

        let found = refs.variable_references_for("Ws-Count");
        assert_eq!(found.len(), 2);
        assert_eq!((found[0].line, found[0].column), (10, 18));
        assert_eq!(found[1].name, "ws-count");
        assert!(refs.target_references_for("ws-count").is_empty());
    }
}
