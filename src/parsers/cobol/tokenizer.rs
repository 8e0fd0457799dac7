//! Line-level lexing for COBOL source
//!
//! The structural parser never builds a full token stream for a unit. Each
//! physical line is scanned on its own: the areas the compiler ignores are
//! blanked out (so columns stay aligned with the original line) and the rest
//! is split into words, literals and periods.
//!
//! Word grammar: `[#0-9A-Za-z][A-Za-z0-9\-_]*`, matched case-insensitively.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Alternation order matters: `*>` must win over a bare period and literals
/// must win over words so quoted text is never split into references.
static LEXEME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\*>|"[^"]*"?|'[^']*'?|[#0-9A-Za-z][A-Za-z0-9\-_]*|\."#)
        .expect("failed to compile lexeme pattern")
});

static WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[#0-9A-Za-z][A-Za-z0-9\-_]*").expect("failed to compile word pattern")
});

/// Column (zero-based) where the indicator area sits in fixed/variable format.
const INDICATOR_COLUMN: usize = 6;
/// First column (zero-based) of area A.
pub const AREA_A_START: usize = 7;
/// First column (zero-based) of area B.
pub const AREA_B_START: usize = 11;
/// Columns from here on are the identification area in fixed format.
const FIXED_RIGHT_MARGIN: usize = 72;

/// Reference format of a source unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Columns 1-6 sequence, 7 indicator, 8-72 program text.
    #[default]
    Fixed,
    /// Like fixed, without the column 72 limit.
    Variable,
    /// No column rules; `*>` comments only.
    Free,
}

impl SourceFormat {
    /// Whether columns carry meaning (sequence/indicator/area A).
    pub fn has_areas(self) -> bool {
        !matches!(self, SourceFormat::Free)
    }
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(SourceFormat::Fixed),
            "variable" => Ok(SourceFormat::Variable),
            "free" => Ok(SourceFormat::Free),
            other => Err(format!("unknown source format '{}'", other)),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Fixed => write!(f, "fixed"),
            SourceFormat::Variable => write!(f, "variable"),
            SourceFormat::Free => write!(f, "free"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexemeKind {
    Word,
    /// Quoted alphanumeric literal, quotes included.
    Literal,
    /// Separator period (followed by whitespace or end of line).
    Period,
}

/// One lexical item on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub text: String,
    /// Zero-based character column in the original line.
    pub column: usize,
}

impl Lexeme {
    pub fn is_word(&self) -> bool {
        self.kind == LexemeKind::Word
    }

    pub fn is_period(&self) -> bool {
        self.kind == LexemeKind::Period
    }

    /// Case-folded text, the form every symbol table is keyed by.
    pub fn folded(&self) -> String {
        self.text.to_ascii_lowercase()
    }

    /// Literal contents without the surrounding quotes.
    pub fn unquoted(&self) -> &str {
        let text = self.text.as_str();
        let text = text
            .strip_prefix('"')
            .or_else(|| text.strip_prefix('\''))
            .unwrap_or(text);
        text.strip_suffix('"')
            .or_else(|| text.strip_suffix('\''))
            .unwrap_or(text)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_word() && self.text.bytes().all(|b| b.is_ascii_digit())
    }
}

/// Classification of one physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannedLine {
    Blank,
    Comment,
    /// A `>>` compiler directive. Carries the new format for
    /// `>>SOURCE FORMAT` directives.
    Directive(Option<SourceFormat>),
    Code(Vec<Lexeme>),
}

/// Scan one physical line in the given format.
pub fn scan_line(line: &str, format: SourceFormat) -> ScannedLine {
    let line = line.trim_end_matches(['\r', '\n']);
    let chars: Vec<char> = line.chars().collect();

    if format.has_areas() {
        if chars.len() <= INDICATOR_COLUMN {
            return ScannedLine::Blank;
        }
        if matches!(chars[INDICATOR_COLUMN], '*' | '/') {
            return ScannedLine::Comment;
        }
    }

    let masked: String = chars
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let outside = match format {
                SourceFormat::Fixed => i <= INDICATOR_COLUMN || i >= FIXED_RIGHT_MARGIN,
                SourceFormat::Variable => i <= INDICATOR_COLUMN,
                SourceFormat::Free => false,
            };
            if outside || c.is_control() { ' ' } else { *c }
        })
        .collect();

    let trimmed = masked.trim_start();
    if trimmed.is_empty() {
        return ScannedLine::Blank;
    }
    if trimmed.starts_with("*>") {
        return ScannedLine::Comment;
    }
    if let Some(directive) = trimmed.strip_prefix(">>") {
        return ScannedLine::Directive(parse_format_directive(directive));
    }

    ScannedLine::Code(lex(&masked))
}

fn lex(masked: &str) -> Vec<Lexeme> {
    let mut lexemes = Vec::new();
    for m in LEXEME_RE.find_iter(masked) {
        let text = m.as_str();
        if text == "*>" {
            break;
        }
        let kind = if text == "." {
            let separator = masked[m.end()..]
                .chars()
                .next()
                .map_or(true, char::is_whitespace);
            if !separator {
                continue;
            }
            LexemeKind::Period
        } else if text.starts_with('"') || text.starts_with('\'') {
            LexemeKind::Literal
        } else {
            LexemeKind::Word
        };
        lexemes.push(Lexeme {
            kind,
            text: text.to_string(),
            column: masked[..m.start()].chars().count(),
        });
    }
    lexemes
}

/// `SOURCE [FORMAT] [IS] FREE|FIXED|VARIABLE`
fn parse_format_directive(directive: &str) -> Option<SourceFormat> {
    let words: Vec<String> = directive
        .split_whitespace()
        .map(|w| w.trim_end_matches('.').to_ascii_lowercase())
        .collect();
    if words.first().map(String::as_str) != Some("source") {
        return None;
    }
    words
        .iter()
        .skip(1)
        .filter(|w| *w != "format" && *w != "is")
        .find_map(|w| w.parse().ok())
}

/// Find the word under a zero-based character column.
///
/// A cursor sitting just past the last character of a word still selects it,
/// the same way editors resolve a word range at a position.
pub fn word_at(line: &str, column: usize) -> Option<&str> {
    let mut touching = None;
    for m in WORD_RE.find_iter(line) {
        let start = line[..m.start()].chars().count();
        let end = start + m.as_str().chars().count();
        if start <= column && column < end {
            return Some(m.as_str());
        }
        if column == end {
            touching = Some(m.as_str());
        }
        if start > column {
            break;
        }
    }
    touching
}
