//! Line-oriented views over a source unit
//!
//! The structural parser only needs lines in file order, so open editor
//! buffers and files on disk are presented through the same trait.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::Path;

use ropey::Rope;

/// A source unit presented as ordered lines.
pub trait SourceHandler: Send + Sync {
    fn line_count(&self) -> usize;

    /// Line `index` (zero-based) without its line terminator.
    fn line(&self, index: usize) -> Option<Cow<'_, str>>;

    /// Identity of the unit (a filesystem path where one exists).
    fn filename(&self) -> &str;

    /// True for an open editor buffer, false for a file read from disk.
    fn is_live_buffer(&self) -> bool;

    fn lines(&self) -> Box<dyn Iterator<Item = Cow<'_, str>> + '_> {
        Box::new((0..self.line_count()).filter_map(move |i| self.line(i)))
    }
}

/// An editor buffer backed by a rope.
#[derive(Debug, Clone)]
pub struct BufferSourceHandler {
    filename: String,
    text: Rope,
}

impl BufferSourceHandler {
    pub fn new(filename: impl Into<String>, text: Rope) -> Self {
        Self {
            filename: filename.into(),
            text,
        }
    }

    pub fn from_text(filename: impl Into<String>, text: &str) -> Self {
        Self::new(filename, Rope::from_str(text))
    }
}

impl SourceHandler for BufferSourceHandler {
    fn line_count(&self) -> usize {
        self.text.len_lines()
    }

    fn line(&self, index: usize) -> Option<Cow<'_, str>> {
        if index >= self.text.len_lines() {
            return None;
        }
        let line = self.text.line(index);
        let owned: String = line.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        Some(Cow::Owned(owned))
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    fn is_live_buffer(&self) -> bool {
        true
    }
}

/// A source file read from disk.
///
/// Bytes that are not valid UTF-8 (EBCDIC-converted or Latin-1 sources are
/// common) are replaced rather than rejected.
#[derive(Debug, Clone)]
pub struct FileSourceHandler {
    filename: String,
    lines: Vec<String>,
}

impl FileSourceHandler {
    pub fn open(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        Ok(Self::from_text(
            path.to_string_lossy(),
            &String::from_utf8_lossy(&bytes),
        ))
    }

    pub fn from_text(filename: impl Into<String>, text: &str) -> Self {
        Self {
            filename: filename.into(),
            lines: text
                .lines()
                .map(|l| l.trim_end_matches('\r').to_string())
                .collect(),
        }
    }
}

impl SourceHandler for FileSourceHandler {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line(&self, index: usize) -> Option<Cow<'_, str>> {
        self.lines.get(index).map(|l| Cow::Borrowed(l.as_str()))
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    fn is_live_buffer(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_and_file_handlers_agree() {
        let text = "       PROCEDURE DIVISION.\r\n       MAIN-PARA.\n           STOP RUN.\n";
        let buffer = BufferSourceHandler::from_text("prog.cbl", text);
        let file = FileSourceHandler::from_text("prog.cbl", text);

        let buffer_lines: Vec<String> = buffer.lines().map(|l| l.into_owned()).collect();
        let file_lines: Vec<String> = file.lines().map(|l| l.into_owned()).collect();

        // The rope reports a trailing empty line after the final newline
        assert_eq!(buffer_lines[..3], file_lines[..]);
        assert!(buffer.is_live_buffer());
        assert!(!file.is_live_buffer());
    }

    #[test]
    fn test_open_replaces_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.cpy");
        fs::write(&path, b"       01  WS-NAME PIC X(10) VALUE 'Jos\xe9'.\n").unwrap();

        let handler = FileSourceHandler::open(&path).unwrap();
        assert_eq!(handler.line_count(), 1);
        assert!(handler.line(0).unwrap().contains("WS-NAME"));
        assert_eq!(handler.filename(), path.to_string_lossy());
    }
}
