//! Per-unit structural parse
//!
//! `QuickParse::parse` walks one source unit line by line and produces its
//! symbol table (paragraphs, sections, data items, copybooks used and the
//! program/class/method names). Reference sites are appended to the shared
//! [`SourceReferences`] passed in by the caller.
//!
//! Parsing never fails: anything that does not match a known construct is
//! either a plain reference or ignored.

use std::collections::HashMap;
use std::mem;

use tracing::trace;

use super::source_refs::SourceReferences;
use super::tokenizer::{
    AREA_A_START, AREA_B_START, Lexeme, LexemeKind, ScannedLine, SourceFormat, scan_line,
};
use super::{CobolToken, ParserConfiguration, TokenKind};
use crate::source_handler::SourceHandler;

/// Symbol table for one parsed source unit.
#[derive(Debug, Default, Clone)]
pub struct QuickParse {
    pub filename: String,
    pub paragraphs: HashMap<String, CobolToken>,
    pub sections: HashMap<String, CobolToken>,
    pub constants_or_variables: HashMap<String, Vec<CobolToken>>,
    /// Logical copybook names, case preserved, in first-reference order.
    pub copybooks_used: Vec<String>,
    pub program_ids: Vec<CobolToken>,
    pub entry_points: Vec<CobolToken>,
    pub class_ids: Vec<CobolToken>,
    pub method_ids: Vec<CobolToken>,
}

impl QuickParse {
    /// Parse `source`, recording its tokens under `file_path` and appending
    /// reference sites to `refs`.
    pub fn parse(
        source: &dyn SourceHandler,
        file_path: &str,
        config: &ParserConfiguration,
        refs: &mut SourceReferences,
    ) -> QuickParse {
        let mut scanner = Scanner::new(file_path, config, refs);
        for (line_number, line) in source.lines().enumerate() {
            scanner.scan(line_number as u32, &line);
        }
        let unit = scanner.unit;

        trace!(
            "Parsed {}: {} paragraph(s), {} section(s), {} data name(s), {} copybook(s)",
            file_path,
            unit.paragraphs.len(),
            unit.sections.len(),
            unit.constants_or_variables.len(),
            unit.copybooks_used.len()
        );

        unit
    }

    pub fn paragraph(&self, name: &str) -> Option<&CobolToken> {
        self.paragraphs.get(&name.to_ascii_lowercase())
    }

    pub fn section(&self, name: &str) -> Option<&CobolToken> {
        self.sections.get(&name.to_ascii_lowercase())
    }

    pub fn variables(&self, name: &str) -> &[CobolToken] {
        self.constants_or_variables
            .get(&name.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Division {
    Unknown,
    Identification,
    Environment,
    Data,
    Procedure,
}

/// What the next word or literal names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Nothing,
    ProgramId,
    ClassId,
    MethodId,
    Entry,
    CopyName,
}

struct Scanner<'a> {
    unit: QuickParse,
    refs: &'a mut SourceReferences,
    config: &'a ParserConfiguration,
    file_id: usize,
    format: SourceFormat,
    division: Division,
    pending: Pending,
    /// Last two words of the current sentence, most recent first.
    prev1: Option<String>,
    prev2: Option<String>,
    in_data_entry: bool,
    in_copy_statement: bool,
    in_exec: bool,
}

impl<'a> Scanner<'a> {
    fn new(
        file_path: &str,
        config: &'a ParserConfiguration,
        refs: &'a mut SourceReferences,
    ) -> Self {
        let file_id = refs.register_filename(file_path);
        Self {
            unit: QuickParse {
                filename: file_path.to_string(),
                ..QuickParse::default()
            },
            refs,
            config,
            file_id,
            format: config.source_format,
            division: Division::Unknown,
            pending: Pending::Nothing,
            prev1: None,
            prev2: None,
            in_data_entry: false,
            in_copy_statement: false,
            in_exec: false,
        }
    }

    fn scan(&mut self, line: u32, text: &str) {
        match scan_line(text, self.format) {
            ScannedLine::Blank | ScannedLine::Comment | ScannedLine::Directive(None) => {}
            ScannedLine::Directive(Some(format)) => self.format = format,
            ScannedLine::Code(lexemes) => self.scan_code(line, &lexemes),
        }
    }

    fn scan_code(&mut self, line: u32, lexemes: &[Lexeme]) {
        let consumed = self
            .division_header(lexemes)
            .or_else(|| self.label(line, lexemes))
            .or_else(|| self.declaration(line, lexemes))
            .unwrap_or(0);

        let rest = &lexemes[consumed..];
        for (i, lexeme) in rest.iter().enumerate() {
            match lexeme.kind {
                LexemeKind::Period => self.period(),
                LexemeKind::Literal => self.literal(line, lexeme),
                LexemeKind::Word => self.word(line, lexeme, rest.get(i + 1)),
            }
        }
    }

    fn division_header(&mut self, lexemes: &[Lexeme]) -> Option<usize> {
        if self.pending != Pending::Nothing {
            return None;
        }
        let (first, second) = (lexemes.first()?, lexemes.get(1)?);
        if !first.is_word() || !second.is_word() || second.folded() != "division" {
            return None;
        }
        self.division = match first.folded().as_str() {
            "identification" | "id" => Division::Identification,
            "environment" => Division::Environment,
            "data" => Division::Data,
            "procedure" => Division::Procedure,
            _ => return None,
        };
        self.end_sentence();
        Some(2)
    }

    /// Paragraph (`name.`) or section (`name SECTION [nn].`) header.
    fn label(&mut self, line: u32, lexemes: &[Lexeme]) -> Option<usize> {
        if !matches!(self.division, Division::Procedure | Division::Unknown)
            || self.pending != Pending::Nothing
            || self.in_data_entry
        {
            return None;
        }
        let first = lexemes.first()?;
        if !first.is_word() || first.is_numeric() {
            return None;
        }
        if self.format.has_areas() {
            if !(AREA_A_START..AREA_B_START).contains(&first.column) {
                return None;
            }
        } else if self.prev1.is_some() {
            // Free format has no area A, so a label can only open a sentence
            return None;
        }
        let name = first.folded();
        if self.config.is_reserved(&name) {
            return None;
        }

        let second = lexemes.get(1)?;
        if second.is_period() {
            let token = self.token(name.clone(), TokenKind::Paragraph, line, first.column);
            self.unit.paragraphs.insert(name, token);
            self.end_sentence();
            return Some(2);
        }

        if second.is_word() && second.folded() == "section" {
            let consumed = match (lexemes.get(2), lexemes.get(3)) {
                (Some(p), _) if p.is_period() => 3,
                (Some(n), Some(p)) if n.is_numeric() && p.is_period() => 4,
                _ => return None,
            };
            let token = self.token(name.clone(), TokenKind::Section, line, first.column);
            self.unit.sections.insert(name, token);
            self.end_sentence();
            return Some(consumed);
        }

        None
    }

    /// Level-number entries and file descriptions.
    fn declaration(&mut self, line: u32, lexemes: &[Lexeme]) -> Option<usize> {
        if self.division == Division::Procedure || self.pending != Pending::Nothing {
            return None;
        }
        let first = lexemes.first()?;

        if first.is_numeric() && first.text.len() <= 2 {
            let level: u8 = first.text.parse().ok()?;
            if !matches!(level, 1..=49 | 66 | 77 | 78 | 88) {
                return None;
            }
            self.end_sentence();
            self.in_data_entry = true;
            return match lexemes.get(1) {
                Some(name) if name.is_word() => {
                    self.declare(line, name);
                    Some(2)
                }
                _ => Some(1),
            };
        }

        if first.is_word() && matches!(first.folded().as_str(), "fd" | "sd" | "rd" | "cd") {
            let name = lexemes.get(1).filter(|l| l.is_word())?;
            self.end_sentence();
            self.in_data_entry = true;
            self.declare(line, name);
            return Some(2);
        }

        None
    }

    fn literal(&mut self, line: u32, lexeme: &Lexeme) {
        let value = lexeme.unquoted();
        if value.is_empty() {
            self.pending = Pending::Nothing;
            return;
        }
        // Names start after the opening quote
        let column = lexeme.column + 1;
        match mem::replace(&mut self.pending, Pending::Nothing) {
            Pending::ProgramId => {
                let token = self.token(value.to_ascii_lowercase(), TokenKind::Callable, line, column);
                self.unit.program_ids.push(token);
            }
            Pending::Entry => {
                let token = self.token(value.to_ascii_lowercase(), TokenKind::Callable, line, column);
                self.unit.entry_points.push(token);
            }
            Pending::ClassId => {
                let token = self.token(value.to_ascii_lowercase(), TokenKind::Class, line, column);
                self.unit.class_ids.push(token);
            }
            Pending::MethodId => {
                let token = self.token(value.to_ascii_lowercase(), TokenKind::Method, line, column);
                self.unit.method_ids.push(token);
            }
            Pending::CopyName => self.add_copybook(value),
            Pending::Nothing => {}
        }
    }

    fn word(&mut self, line: u32, lexeme: &Lexeme, next: Option<&Lexeme>) {
        let folded = lexeme.folded();

        match mem::replace(&mut self.pending, Pending::Nothing) {
            Pending::ProgramId => {
                let token = self.token(folded.clone(), TokenKind::Callable, line, lexeme.column);
                self.unit.program_ids.push(token);
                self.push_word(folded);
                return;
            }
            Pending::ClassId => {
                let token = self.token(folded.clone(), TokenKind::Class, line, lexeme.column);
                self.unit.class_ids.push(token);
                self.push_word(folded);
                return;
            }
            Pending::MethodId => {
                let token = self.token(folded.clone(), TokenKind::Method, line, lexeme.column);
                self.unit.method_ids.push(token);
                self.push_word(folded);
                return;
            }
            Pending::CopyName => {
                self.add_copybook(&lexeme.text);
                self.push_word(folded);
                return;
            }
            Pending::Entry | Pending::Nothing => {}
        }

        match folded.as_str() {
            "copy" => {
                self.pending = Pending::CopyName;
                self.in_copy_statement = true;
            }
            "include" if self.in_exec => {
                self.pending = Pending::CopyName;
                self.in_copy_statement = true;
            }
            "program-id" => self.pending = Pending::ProgramId,
            "class-id" => self.pending = Pending::ClassId,
            "method-id" => self.pending = Pending::MethodId,
            "entry" => self.pending = Pending::Entry,
            "exec" => self.in_exec = true,
            "end-exec" => {
                self.in_exec = false;
                self.in_copy_statement = false;
            }
            _ => {}
        }

        let user_word = !lexeme.is_numeric()
            && !self.config.is_reserved(&folded)
            && !self.in_copy_statement;

        if user_word {
            if self.in_data_entry || self.division == Division::Data {
                self.data_word(line, lexeme, &folded);
            } else if matches!(self.division, Division::Procedure | Division::Unknown) {
                self.procedure_word(line, lexeme, &folded, next);
            }
        }

        self.push_word(folded);
    }

    fn data_word(&mut self, line: u32, lexeme: &Lexeme, folded: &str) {
        let prev1 = self.prev1.as_deref();
        let prev2 = self.prev2.as_deref();

        let index_name = prev2 == Some("indexed") && prev1 == Some("by");
        let referenced = matches!(
            prev1,
            Some("redefines" | "renames" | "thru" | "through" | "depending")
        ) || (prev2 == Some("depending") && prev1 == Some("on"));

        if index_name {
            self.declare(line, lexeme);
        } else if referenced {
            self.refs
                .add_variable_reference(folded, self.file_id, line, lexeme.column as u32);
        }
    }

    fn procedure_word(&mut self, line: u32, lexeme: &Lexeme, folded: &str, next: Option<&Lexeme>) {
        let prev1 = self.prev1.as_deref();
        let prev2 = self.prev2.as_deref();
        let column = lexeme.column as u32;

        let after_transfer = matches!(prev1, Some("perform" | "thru" | "through" | "go"))
            || (prev2 == Some("go") && prev1 == Some("to"));
        // PERFORM n TIMES names a counter, not a procedure
        let counter = next.is_some_and(|n| n.is_word() && n.folded() == "times");

        if after_transfer && !counter {
            self.refs.add_target_reference(folded, self.file_id, line, column);
        } else {
            self.refs.add_variable_reference(folded, self.file_id, line, column);
        }
    }

    fn declare(&mut self, line: u32, name: &Lexeme) {
        let folded = name.folded();
        if name.is_numeric() || folded == "filler" || self.config.is_reserved(&folded) {
            return;
        }
        let token = self.token(folded.clone(), TokenKind::Variable, line, name.column);
        self.unit
            .constants_or_variables
            .entry(folded)
            .or_default()
            .push(token);
    }

    fn add_copybook(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty()
            || self
                .unit
                .copybooks_used
                .iter()
                .any(|c| c.eq_ignore_ascii_case(name))
        {
            return;
        }
        self.unit.copybooks_used.push(name.to_string());
    }

    fn token(&self, name: String, kind: TokenKind, line: u32, column: usize) -> CobolToken {
        CobolToken {
            name,
            kind,
            filename: self.unit.filename.clone(),
            start_line: line,
            start_column: column as u32,
        }
    }

    fn push_word(&mut self, folded: String) {
        self.prev2 = self.prev1.take();
        self.prev1 = Some(folded);
    }

    /// `PROGRAM-ID. NAME.` puts a separator period before the name.
    fn period(&mut self) {
        let pending = self.pending;
        self.end_sentence();
        if matches!(pending, Pending::ProgramId | Pending::ClassId | Pending::MethodId) {
            self.pending = pending;
        }
    }

    fn end_sentence(&mut self) {
        self.prev1 = None;
        self.prev2 = None;
        self.pending = Pending::Nothing;
        self.in_data_entry = false;
        self.in_copy_statement = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_handler::FileSourceHandler;
    use indoc::indoc;
    use quickcheck::quickcheck;

    /// Shift indoc'd text into area A of a fixed-format listing.
    fn fixed(text: &str) -> String {
        text.lines()
            .map(|l| if l.is_empty() { String::new() } else { format!("       {}", l) })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn parse(text: &str) -> (QuickParse, SourceReferences) {
        parse_with(&fixed(text), &ParserConfiguration::default())
    }

    fn parse_with(text: &str, config: &ParserConfiguration) -> (QuickParse, SourceReferences) {
        let mut refs = SourceReferences::new();
        let source = FileSourceHandler::from_text("/src/prog.cbl", text);
        let unit = QuickParse::parse(&source, "/src/prog.cbl", config, &mut refs);
        (unit, refs)
    }

    const PROGRAM: &str = indoc! {"
               IDENTIFICATION DIVISION.
               PROGRAM-ID. DEMO.
               DATA DIVISION.
               WORKING-STORAGE SECTION.
               COPY WS-FIELDS.
               01  WS-TOTAL       PIC 9(6).
               01  WS-TABLE.
                   05 WS-ITEM     PIC X OCCURS 10 TIMES INDEXED BY WS-IDX.
               01  WS-ALT REDEFINES WS-TOTAL PIC X(6).
               PROCEDURE DIVISION.
               MAIN-PARA.
                   ADD 1 TO WS-COUNT
                   PERFORM INIT-SECTION
                   PERFORM READ-PARA THRU READ-EXIT
                   GO TO END-PARA.
               INIT-SECTION SECTION.
               READ-PARA.
                   MOVE ZERO TO WS-TOTAL.
               READ-EXIT.
                   EXIT.
               END-PARA.
                   STOP RUN.
    "};

    #[test]
    fn test_paragraphs_and_sections() {
        let (unit, _) = parse(PROGRAM);
        let main = unit.paragraph("MAIN-PARA").expect("MAIN-PARA");
        assert_eq!((main.start_line, main.start_column), (10, 7));
        assert_eq!(main.kind, TokenKind::Paragraph);
        assert!(unit.paragraph("read-para").is_some());
        assert!(unit.paragraph("end-para").is_some());
        assert!(unit.section("init-section").is_some());
        // Data division section headers are not procedure labels
        assert!(unit.section("working-storage").is_none());
        assert_eq!(unit.paragraphs.len(), 4);
    }

    #[test]
    fn test_data_declarations() {
        let (unit, refs) = parse(PROGRAM);
        for name in ["ws-total", "ws-table", "ws-item", "ws-idx", "ws-alt"] {
            assert_eq!(unit.variables(name).len(), 1, "missing declaration {}", name);
        }
        let total = &unit.variables("WS-TOTAL")[0];
        assert_eq!((total.start_line, total.start_column), (5, 11));
        // REDEFINES target is a reference
        let redefines = refs.variable_references_for("ws-total");
        assert!(redefines.iter().any(|r| r.line == 8));
    }

    #[test]
    fn test_copybooks_and_program_id() {
        let (unit, _) = parse(PROGRAM);
        assert_eq!(unit.copybooks_used, vec!["WS-FIELDS".to_string()]);
        assert_eq!(unit.program_ids.len(), 1);
        assert_eq!(unit.program_ids[0].name, "demo");
        assert_eq!(unit.program_ids[0].kind, TokenKind::Callable);
    }

    #[test]
    fn test_target_and_variable_references() {
        let (_, refs) = parse(PROGRAM);
        for target in ["init-section", "read-para", "read-exit", "end-para"] {
            assert_eq!(refs.target_references_for(target).len(), 1, "target {}", target);
        }
        let count = refs.variable_references_for("ws-count");
        assert_eq!(count.len(), 1);
        assert_eq!((count[0].line, count[0].column), (11, 20));
        assert_eq!(refs.filename(count[0].file_id), Some("/src/prog.cbl"));
        // Reserved words and literals are never references
        assert!(refs.variable_references_for("zero").is_empty());
        assert!(refs.variable_references_for("to").is_empty());
    }

    #[test]
    fn test_perform_times_counter_is_a_variable() {
        let (_, refs) = parse(indoc! {"
                   PROCEDURE DIVISION.
                   MAIN.
                       PERFORM WS-N TIMES
                           DISPLAY WS-N
                       END-PERFORM.
        "});
        assert!(refs.target_references_for("ws-n").is_empty());
        assert_eq!(refs.variable_references_for("ws-n").len(), 2);
    }

    #[test]
    fn test_copybook_without_divisions() {
        let (unit, refs) = parse(indoc! {"
                   01  WS-FIELDS.
                       05  WS-COUNT        PIC 9(4) VALUE ZERO.
                       05  WS-FLAG         PIC X.
                           88  WS-DONE     VALUE 'Y'.
                       05  FILLER          PIC X(10).
        "});
        assert_eq!(unit.constants_or_variables.len(), 4);
        assert!(unit.variables("filler").is_empty());
        assert!(refs.constants_or_variables_references.is_empty());
    }

    #[test]
    fn test_copy_statement_forms() {
        let (unit, _) = parse(indoc! {"
                   PROCEDURE DIVISION.
                   COPY \"proc-lib.cpy\".
                   COPY Fields REPLACING ==WS-A== BY ==WS-B==.
                   COPY FIELDS.
                   EXEC SQL INCLUDE SQLCA END-EXEC.
        "});
        assert_eq!(unit.copybooks_used, vec!["proc-lib.cpy", "Fields", "SQLCA"]);
    }

    #[test]
    fn test_free_format_labels_need_an_open_sentence() {
        let config = ParserConfiguration::with_format(SourceFormat::Free);
        let (unit, refs) = parse_with(
            indoc! {"
                PROCEDURE DIVISION.
                MAIN-PARA.
                    MOVE WS-A TO
                    WS-B.
                NEXT-PARA. DISPLAY WS-A.
            "},
            &config,
        );
        assert!(unit.paragraph("main-para").is_some());
        assert!(unit.paragraph("next-para").is_some());
        assert!(unit.paragraph("ws-b").is_none());
        assert_eq!(refs.variable_references_for("ws-b").len(), 1);
        assert_eq!(refs.variable_references_for("ws-a").len(), 2);
    }

    #[test]
    fn test_source_format_directive_switches_mid_file() {
        let text = indoc! {"
                   >>SOURCE FORMAT IS FREE
            PROCEDURE DIVISION.
            FREE-PARA.
                STOP RUN.
        "};
        let (unit, _) = parse_with(text, &ParserConfiguration::default());
        assert!(unit.paragraph("free-para").is_some());
    }

    #[test]
    fn test_oo_and_entry_names() {
        let (unit, _) = parse(indoc! {"
                   CLASS-ID. Account.
                   METHOD-ID. \"Deposit\".
                   PROCEDURE DIVISION.
                   ENTRY \"ALTENTRY\" USING WS-A.
        "});
        assert_eq!(unit.class_ids[0].name, "account");
        assert_eq!(unit.method_ids[0].name, "deposit");
        assert_eq!(unit.entry_points[0].name, "altentry");
        assert_eq!(unit.entry_points[0].start_column, 14);
        assert!(unit.program_ids.is_empty());
    }

    #[test]
    fn test_comment_lines_are_ignored() {
        let text = concat!(
            "       PROCEDURE DIVISION.\n",
            "      *COMMENTED-PARA.\n",
            "       LIVE-PARA.\n",
            "           DISPLAY WS-X. *> WS-Y\n",
        );
        let (unit, refs) = parse_with(text, &ParserConfiguration::default());
        assert!(unit.paragraph("commented-para").is_none());
        assert!(unit.paragraph("live-para").is_some());
        assert!(refs.variable_references_for("ws-y").is_empty());
    }

    #[test]
    fn test_duplicate_paragraph_last_write_wins() {
        let (unit, _) = parse(indoc! {"
                   PROCEDURE DIVISION.
                   DUP-PARA.
                       EXIT.
                   DUP-PARA.
                       EXIT.
        "});
        assert_eq!(unit.paragraph("dup-para").unwrap().start_line, 3);
    }

    quickcheck! {
        fn prop_parse_never_panics(lines: Vec<String>) -> bool {
            let text = lines.join("\n");
            for format in [SourceFormat::Fixed, SourceFormat::Variable, SourceFormat::Free] {
                let config = ParserConfiguration::with_format(format);
                let _ = parse_with(&text, &config);
            }
            true
        }
    }
}
