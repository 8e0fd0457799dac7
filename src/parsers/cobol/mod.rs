//! Lightweight structural parsing for COBOL
//!
//! This is not a grammar. Each line is classified on its own with a small
//! amount of carried context (current division, the last two words of the
//! current sentence), which is enough to find paragraph and section labels,
//! data declarations, copybook includes and the references between them.

pub mod quick_parse;
pub mod reserved;
pub mod source_refs;
pub mod tokenizer;

use std::collections::HashSet;

pub use quick_parse::QuickParse;
pub use source_refs::{SourceReference, SourceReferences};
pub use tokenizer::{SourceFormat, word_at};

/// Dialect options consumed by the parser.
#[derive(Debug, Clone)]
pub struct ParserConfiguration {
    /// Reference format used until a `>>SOURCE FORMAT` directive says otherwise.
    pub source_format: SourceFormat,
    /// Case-folded words never recorded as user symbols.
    pub reserved_words: HashSet<String>,
}

impl Default for ParserConfiguration {
    fn default() -> Self {
        Self {
            source_format: SourceFormat::Fixed,
            reserved_words: reserved::default_reserved_words(),
        }
    }
}

impl ParserConfiguration {
    pub fn with_format(source_format: SourceFormat) -> Self {
        Self {
            source_format,
            ..Self::default()
        }
    }

    /// Add dialect-specific reserved words on top of the defaults.
    pub fn extend_reserved<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.reserved_words
            .extend(words.into_iter().map(|w| w.as_ref().to_ascii_lowercase()));
    }

    pub fn is_reserved(&self, folded: &str) -> bool {
        self.reserved_words.contains(folded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Paragraph,
    Section,
    Variable,
    /// `PROGRAM-ID` or `ENTRY` name.
    Callable,
    Class,
    Method,
}

/// A named structural element found by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CobolToken {
    /// Case-folded name.
    pub name: String,
    pub kind: TokenKind,
    /// Path of the unit the token was found in.
    pub filename: String,
    /// Zero-based.
    pub start_line: u32,
    /// Zero-based character column.
    pub start_column: u32,
}
