//! Server configuration
//!
//! Settings come from three places, highest precedence first: command-line
//! flags ([`ConfigOverrides`]), the `COBOL_LS_CACHE_DIR` environment variable,
//! and the client's `initializationOptions` (deserialized into
//! [`ServerConfig`]). Anything left unset keeps its default.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::lsp::backend::persistent_cache::get_workspace_cache_dir;
use crate::lsp::copybook::SearchPathCopybookResolver;
use crate::parsers::cobol::{ParserConfiguration, SourceFormat};

pub const CACHE_DIR_ENV: &str = "COBOL_LS_CACHE_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Directories searched for copybooks after the referencing file's own.
    pub copybook_directories: Vec<PathBuf>,
    pub copybook_extensions: Vec<String>,
    /// Extensions indexed during the workspace scan.
    pub source_extensions: Vec<String>,
    pub source_format: SourceFormat,
    /// Overrides the per-workspace directory under the user cache dir.
    pub cache_directory: Option<PathBuf>,
    /// Dialect words never treated as user symbols.
    pub extra_reserved_words: Vec<String>,
    pub scan_workspace: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            copybook_directories: Vec::new(),
            copybook_extensions: ["cpy", "cbl", "cob", "copy"].map(String::from).to_vec(),
            source_extensions: ["cbl", "cob", "cobol", "cpy", "pco"].map(String::from).to_vec(),
            source_format: SourceFormat::Fixed,
            cache_directory: None,
            extra_reserved_words: Vec::new(),
            scan_workspace: true,
        }
    }
}

/// Settings given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub cache_directory: Option<PathBuf>,
    /// Searched before any configured directory.
    pub copybook_directories: Vec<PathBuf>,
    pub source_format: Option<SourceFormat>,
    pub no_workspace_scan: bool,
}

impl ServerConfig {
    /// Build the effective configuration from every source.
    pub fn resolve(options: Option<&serde_json::Value>, overrides: &ConfigOverrides) -> Self {
        let mut config = Self::from_initialization_options(options);
        config.apply_env();
        config.apply_overrides(overrides);
        debug!("Effective server configuration: {:?}", config);
        config
    }

    /// Malformed options are reported and replaced by the defaults.
    pub fn from_initialization_options(options: Option<&serde_json::Value>) -> Self {
        match options {
            None | Some(serde_json::Value::Null) => Self::default(),
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                warn!("Ignoring invalid initializationOptions: {}", e);
                Self::default()
            }),
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_cache_dir_env(std::env::var_os(CACHE_DIR_ENV));
    }

    fn apply_cache_dir_env(&mut self, value: Option<OsString>) {
        if let Some(dir) = value.filter(|v| !v.is_empty()) {
            self.cache_directory = Some(PathBuf::from(dir));
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(dir) = &overrides.cache_directory {
            self.cache_directory = Some(dir.clone());
        }
        if !overrides.copybook_directories.is_empty() {
            let mut dirs = overrides.copybook_directories.clone();
            dirs.extend(self.copybook_directories.drain(..));
            self.copybook_directories = dirs;
        }
        if let Some(format) = overrides.source_format {
            self.source_format = format;
        }
        if overrides.no_workspace_scan {
            self.scan_workspace = false;
        }
    }

    pub fn parser_configuration(&self) -> ParserConfiguration {
        let mut config = ParserConfiguration::with_format(self.source_format);
        config.extend_reserved(&self.extra_reserved_words);
        config
    }

    pub fn copybook_resolver(&self) -> SearchPathCopybookResolver {
        SearchPathCopybookResolver::new(
            self.copybook_directories.clone(),
            self.copybook_extensions.clone(),
        )
    }

    /// Where the caches for `workspace_root` live.
    pub fn resolve_cache_dir(&self, workspace_root: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_directory {
            return Ok(dir.clone());
        }
        let root = match workspace_root {
            Some(root) => root.to_path_buf(),
            None => std::env::current_dir().context("Failed to determine working directory")?,
        };
        get_workspace_cache_dir(&root)
    }

    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.source_extensions
                    .iter()
                    .any(|known| known.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }
}
