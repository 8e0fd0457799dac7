//! File modification timestamps for incremental workspace indexing
//!
//! Records the modification time of every source file at the moment it was
//! last indexed, so a restart only re-parses files that changed. The table is
//! persisted with bincode next to the global caches as `file_timestamps.bin`.
//!
//! ```ignore
//! let tracker = FileModificationTracker::with_cache_dir(cache_dir).await?;
//! if tracker.has_changed(&path).await? {
//!     index_file(&path)?;
//!     tracker.mark_indexed(&path).await?;
//! }
//! tracker.persist().await?;
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

pub const TIMESTAMP_FILE: &str = "file_timestamps.bin";

/// Tracks file modification timestamps across server restarts.
#[derive(Clone, Debug)]
pub struct FileModificationTracker {
    /// Path → modification time when last indexed
    timestamps: Arc<DashMap<PathBuf, SystemTime>>,
    cache_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct TimestampCache {
    timestamps: HashMap<PathBuf, SystemTime>,
}

impl FileModificationTracker {
    /// Open the tracker stored in `cache_dir`, creating the directory if needed.
    ///
    /// An unreadable timestamp file is ignored and the tracker starts empty.
    pub async fn with_cache_dir(cache_dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&cache_dir).await?;

        let tracker = Self {
            timestamps: Arc::new(DashMap::new()),
            cache_path: cache_dir.join(TIMESTAMP_FILE),
        };

        if let Err(e) = tracker.load().await {
            debug!("No usable file timestamps on disk (starting fresh): {}", e);
        }

        Ok(tracker)
    }

    /// `Ok(true)` if the file changed since it was last indexed or was never
    /// indexed.
    pub async fn has_changed(&self, path: &Path) -> io::Result<bool> {
        let current_mtime = Self::get_modification_time(path).await?;
        Ok(match self.timestamps.get(path) {
            Some(cached) => current_mtime > *cached,
            None => true,
        })
    }

    pub async fn mark_indexed(&self, path: &Path) -> io::Result<()> {
        let mtime = Self::get_modification_time(path).await?;
        self.timestamps.insert(path.to_path_buf(), mtime);
        Ok(())
    }

    pub fn get_cached_time(&self, path: &Path) -> Option<SystemTime> {
        self.timestamps.get(path).map(|entry| *entry)
    }

    pub fn remove(&self, path: &Path) {
        self.timestamps.remove(path);
    }

    /// Tracked paths that no longer exist on disk.
    pub fn missing_files(&self) -> Vec<PathBuf> {
        self.timestamps
            .iter()
            .filter(|entry| !entry.key().exists())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn clear(&self) {
        self.timestamps.clear();
    }

    /// Write the table to disk (tmp file + rename).
    pub async fn persist(&self) -> io::Result<()> {
        let cache = TimestampCache {
            timestamps: self
                .timestamps
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        };

        let data = bincode::serialize(&cache).map_err(|e| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to serialize timestamps: {}", e),
            )
        })?;

        let temp_path = self.cache_path.with_extension("tmp");
        fs::write(&temp_path, &data).await?;
        fs::rename(&temp_path, &self.cache_path).await?;

        debug!(
            "Persisted {} file timestamps to {:?}",
            cache.timestamps.len(),
            self.cache_path
        );
        Ok(())
    }

    async fn load(&self) -> io::Result<()> {
        let data = fs::read(&self.cache_path).await?;
        let cache: TimestampCache = bincode::deserialize(&data).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to deserialize timestamps: {}", e),
            )
        })?;

        for (path, mtime) in cache.timestamps {
            self.timestamps.insert(path, mtime);
        }

        debug!(
            "Loaded {} file timestamps from {:?}",
            self.timestamps.len(),
            self.cache_path
        );
        Ok(())
    }

    async fn get_modification_time(path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path).await?.modified()
    }
}
