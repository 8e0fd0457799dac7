//! Find-references and go-to-definition over a unit and its copybooks
//!
//! A query parses the active unit, then each copybook it names (one level
//! deep), all into one shared [`SourceReferences`]. The word under the cursor
//! is then looked up in every unit's symbol table and in the shared
//! reference lists.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::lsp::copybook::CopybookResolver;
use crate::lsp::models::SymbolLocation;
use crate::parsers::cobol::{CobolToken, ParserConfiguration, QuickParse, SourceReferences, word_at};
use crate::source_handler::{FileSourceHandler, SourceHandler};

/// Word under a zero-based `(line, column)`, or `None` on whitespace or
/// punctuation.
pub fn word_at_position(source: &dyn SourceHandler, line: u32, column: u32) -> Option<String> {
    let text = source.line(line as usize)?;
    word_at(&text, column as usize).map(str::to_string)
}

/// Parsed units of one query plus the references they recorded.
struct Analysis {
    /// Root unit first, then copybooks in expansion order.
    units: Vec<QuickParse>,
    refs: SourceReferences,
}

pub struct ReferenceResolver<'a> {
    config: &'a ParserConfiguration,
    copybooks: &'a dyn CopybookResolver,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(config: &'a ParserConfiguration, copybooks: &'a dyn CopybookResolver) -> Self {
        Self { config, copybooks }
    }

    /// Every definition and reference of the symbol under the cursor.
    ///
    /// Results are ordered per unit (paragraph, section, data declarations),
    /// then procedure target references, then data references. `None` when
    /// there is no word under the cursor or nothing matches.
    pub fn find_references(
        &self,
        source: &dyn SourceHandler,
        line: u32,
        column: u32,
    ) -> Option<Vec<SymbolLocation>> {
        let word = word_at_position(source, line, column)?;
        let name = word.to_ascii_lowercase();
        let analysis = self.analyze(source);

        let mut locations = declarations(&analysis.units, &name);
        let length = name.chars().count() as u32;
        for reference in analysis
            .refs
            .target_references_for(&name)
            .iter()
            .chain(analysis.refs.variable_references_for(&name))
        {
            if let Some(filename) = analysis.refs.filename(reference.file_id) {
                locations.push(SymbolLocation::new(
                    filename,
                    reference.line,
                    reference.column,
                    length,
                ));
            }
        }

        debug!("find_references '{}': {} location(s)", name, locations.len());
        (!locations.is_empty()).then_some(locations)
    }

    /// Declarations (paragraph, section, data item) of the symbol under the
    /// cursor.
    pub fn find_definitions(
        &self,
        source: &dyn SourceHandler,
        line: u32,
        column: u32,
    ) -> Option<Vec<SymbolLocation>> {
        let word = word_at_position(source, line, column)?;
        let name = word.to_ascii_lowercase();
        let analysis = self.analyze(source);

        let locations = declarations(&analysis.units, &name);
        debug!("find_definitions '{}': {} location(s)", name, locations.len());
        (!locations.is_empty()).then_some(locations)
    }

    fn analyze(&self, source: &dyn SourceHandler) -> Analysis {
        let mut refs = SourceReferences::new();
        let root = QuickParse::parse(source, source.filename(), self.config, &mut refs);

        let referencing = Path::new(source.filename());
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut units = Vec::with_capacity(root.copybooks_used.len() + 1);

        for name in &root.copybooks_used {
            let path = match self.copybooks.resolve(name, referencing) {
                Ok(Some(path)) => path,
                Ok(None) => {
                    warn!("Copybook {} not found (referenced from {})", name, source.filename());
                    continue;
                }
                Err(e) => {
                    warn!("Failed to resolve copybook {}: {:#}", name, e);
                    continue;
                }
            };
            if !seen.insert(path.clone()) {
                continue;
            }
            match FileSourceHandler::open(&path) {
                Ok(handler) => {
                    let filename = path.to_string_lossy();
                    units.push(QuickParse::parse(&handler, &filename, self.config, &mut refs));
                }
                Err(e) => warn!("Failed to read copybook {}: {}", path.display(), e),
            }
        }

        units.insert(0, root);
        Analysis { units, refs }
    }
}

fn declarations(units: &[QuickParse], name: &str) -> Vec<SymbolLocation> {
    let mut locations = Vec::new();
    for unit in units {
        let tokens = unit
            .paragraph(name)
            .into_iter()
            .chain(unit.section(name))
            .chain(unit.variables(name));
        locations.extend(tokens.map(token_location));
    }
    locations
}

fn token_location(token: &CobolToken) -> SymbolLocation {
    SymbolLocation::new(
        &token.filename,
        token.start_line,
        token.start_column,
        token.name.chars().count() as u32,
    )
}
