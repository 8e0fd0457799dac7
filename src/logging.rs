use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use time::UtcOffset;
use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{self, fmt, prelude::*};

const LOG_RETENTION_DAYS: u64 = 7;

/// Get the log directory path in the user-specific OS cache directory
/// - Linux: ~/.cache/cobol-language-server/logs/
/// - macOS: ~/Library/Caches/cobol-language-server/logs/
/// - Windows: %LOCALAPPDATA%\cobol-language-server\logs\
fn get_log_dir() -> io::Result<PathBuf> {
    let cache_dir = dirs::cache_dir().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "Unable to determine user cache directory")
    })?;

    let log_dir = cache_dir.join("cobol-language-server").join("logs");
    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

/// Remove session logs older than LOG_RETENTION_DAYS
fn cleanup_old_logs(log_dir: &Path) -> io::Result<()> {
    let now = std::time::SystemTime::now();
    let retention = std::time::Duration::from_secs(LOG_RETENTION_DAYS * 24 * 60 * 60);

    for entry in fs::read_dir(log_dir)?.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let is_session_log = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with("session-") && name.ends_with(".log"));
        if !is_session_log {
            continue;
        }
        let expired = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > retention);
        if expired {
            if let Err(e) = fs::remove_file(entry.path()) {
                eprintln!("Failed to remove old log file {:?}: {}", entry.path(), e);
            }
        }
    }

    Ok(())
}

fn session_id() -> String {
    let pattern = format_description!("[year][month][day]-[hour][minute][second]");
    let timestamp = time::OffsetDateTime::now_utc()
        .format(pattern)
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}-{}", timestamp, std::process::id())
}

fn already_initialized(e: &dyn std::error::Error) -> bool {
    let message = e.to_string();
    message.contains("already been set") || message.contains("SetLoggerError")
}

/// Initialize logging to stderr and, optionally, a per-session file.
/// The returned guard must be kept alive for the duration of the program.
///
/// # Arguments
/// * `no_color` - Disable ANSI colors in stderr output
/// * `log_level` - Override log level (otherwise uses RUST_LOG or defaults to "info")
/// * `enable_file_logging` - Also log at DEBUG level to a session file
///
/// Stdout carries the protocol, so nothing here ever writes to it.
pub fn init_logger(
    no_color: bool,
    log_level: Option<&str>,
    enable_file_logging: bool,
) -> io::Result<WorkerGuard> {
    let timer = fmt::time::OffsetTime::new(
        UtcOffset::UTC,
        format_description!(
            "[[[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z]"
        ),
    );

    let stderr_filter = match log_level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(timer.clone())
        .with_ansi(!no_color)
        .with_filter(stderr_filter);

    if !enable_file_logging {
        let (_, guard) = tracing_appender::non_blocking(std::io::sink());
        return match tracing_subscriber::registry().with(stderr_layer).try_init() {
            Ok(()) => Ok(guard),
            Err(e) if already_initialized(&e) => Ok(guard),
            Err(e) => Err(io::Error::other(e)),
        };
    }

    let log_dir = get_log_dir()?;
    cleanup_old_logs(&log_dir)?;

    let log_path = log_dir.join(format!("session-{}.log", session_id()));
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_timer(timer)
        .with_ansi(false)
        .with_filter(tracing_subscriber::EnvFilter::new("debug"));

    match tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        Ok(()) => {
            eprintln!("Logging to file: {:?}", log_path);
            Ok(guard)
        }
        Err(e) if already_initialized(&e) => Ok(guard),
        Err(e) => Err(io::Error::other(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_cleanup_keeps_recent_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let recent = temp_dir.path().join("session-20260101-000000-1.log");
        let foreign = temp_dir.path().join("notes.txt");
        fs::write(&recent, "x").unwrap();
        fs::write(&foreign, "x").unwrap();

        cleanup_old_logs(temp_dir.path()).unwrap();

        assert!(recent.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn test_cleanup_removes_expired_session_logs() {
        let temp_dir = TempDir::new().unwrap();
        let old = temp_dir.path().join("session-20200101-000000-1.log");
        fs::write(&old, "x").unwrap();
        let file = fs::File::options().write(true).open(&old).unwrap();
        let long_ago = SystemTime::now() - Duration::from_secs((LOG_RETENTION_DAYS + 1) * 86_400);
        file.set_modified(long_ago).unwrap();
        drop(file);

        cleanup_old_logs(temp_dir.path()).unwrap();

        assert!(!old.exists());
    }

    #[test]
    fn test_session_id_carries_pid() {
        assert!(session_id().ends_with(&format!("-{}", std::process::id())));
    }
}
