//! Copybook name resolution
//!
//! A `COPY` statement names a copybook by a logical name (`WS-FIELDS`,
//! `'common/dates.cpy'`). Resolution maps that name to a file on disk.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::trace;

/// Maps a logical copybook name to a file.
///
/// `Ok(None)` means the copybook could not be found; callers treat it the
/// same as an error and skip the copybook.
pub trait CopybookResolver: Send + Sync {
    fn resolve(&self, logical_name: &str, referencing_file: &Path) -> Result<Option<PathBuf>>;
}

/// Searches the referencing file's directory, then each configured
/// directory, for the name as written and with each known extension.
#[derive(Debug, Clone)]
pub struct SearchPathCopybookResolver {
    directories: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl SearchPathCopybookResolver {
    pub fn new(directories: Vec<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            directories,
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Candidate file names for `name` inside one directory, in the order
    /// they are tried.
    fn candidates(&self, name: &str) -> Vec<String> {
        let mut names = vec![name.to_string()];
        for ext in &self.extensions {
            for candidate in [
                format!("{}.{}", name, ext),
                format!("{}.{}", name.to_ascii_uppercase(), ext.to_ascii_uppercase()),
                format!("{}.{}", name.to_ascii_lowercase(), ext.to_ascii_lowercase()),
            ] {
                if !names.contains(&candidate) {
                    names.push(candidate);
                }
            }
        }
        names
    }
}

impl CopybookResolver for SearchPathCopybookResolver {
    fn resolve(&self, logical_name: &str, referencing_file: &Path) -> Result<Option<PathBuf>> {
        let name = logical_name.trim().trim_matches(['"', '\'']);
        if name.is_empty() {
            return Ok(None);
        }

        let as_path = Path::new(name);
        if as_path.is_absolute() {
            return Ok(as_path.is_file().then(|| as_path.to_path_buf()));
        }

        let search = referencing_file
            .parent()
            .into_iter()
            .chain(self.directories.iter().map(PathBuf::as_path));

        let candidates = self.candidates(name);
        for dir in search {
            for candidate in &candidates {
                let path = dir.join(candidate);
                if path.is_file() {
                    trace!("Resolved copybook {} to {}", logical_name, path.display());
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }
}
