//! On-disk storage for the workspace caches
//!
//! Architecture:
//! - Serialization format: JSON (serde_json)
//! - Compression: zstd level 3
//! - Cache location: ~/.cache/cobol-language-server/v1/workspace-{hash}/
//! - Atomic writes: tmp file + rename so a crash never leaves a torn file
//!
//! The global symbol and file tables are stored here, alongside the
//! file modification tracker's `file_timestamps.bin`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Current cache layout version
///
/// Increment this when the persisted tables change shape so old caches land
/// in a different directory and are never read.
pub const CACHE_VERSION: u32 = 1;

/// zstd level used for every cache file.
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decompress {path}: {source}")]
    Decompress {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode cache table: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Get the workspace-specific cache directory
///
/// Structure: ~/.cache/cobol-language-server/v{VERSION}/workspace-{hash}/
///
/// where {hash} is the first 16 hex digits of blake3(workspace_root_path).
pub fn get_workspace_cache_dir(workspace_root: &Path) -> Result<PathBuf> {
    let base_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow::anyhow!("Failed to determine cache directory"))?
        .join("cobol-language-server");

    let version_dir = base_dir.join(format!("v{}", CACHE_VERSION));

    let workspace_path_str = workspace_root.to_string_lossy();
    let workspace_hash = blake3::hash(workspace_path_str.as_bytes());
    let workspace_hash_hex = workspace_hash.to_hex();

    Ok(version_dir.join(format!("workspace-{}", &workspace_hash_hex[..16])))
}

/// Read a zstd-compressed JSON document.
pub fn read_compressed_json<T: DeserializeOwned>(path: &Path) -> Result<T, CacheError> {
    let compressed = fs::read(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let json = zstd::decode_all(compressed.as_slice()).map_err(|source| CacheError::Decompress {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&json).map_err(|source| CacheError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize `value` as JSON, compress it and atomically replace `path`.
///
/// The parent directory is created when missing.
pub fn write_compressed_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = serde_json::to_vec(value)?;
    let compressed = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL).map_err(io_err)?;

    let temp_path = path.with_extension("zst.tmp");
    fs::write(&temp_path, compressed).map_err(io_err)?;
    fs::rename(&temp_path, path).map_err(io_err)?;
    Ok(())
}
