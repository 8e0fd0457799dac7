//! Parser modules

pub mod cobol;

pub use cobol::{CobolToken, ParserConfiguration, QuickParse, SourceReferences, TokenKind};
