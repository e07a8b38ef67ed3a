//! # Tracing Setup
//!
//! Installs the global `tracing` subscriber used by the servers: an ANSI
//! console layer and a JSON layer writing to a daily rotating file through a
//! non-blocking appender.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Sets up console and rotating-file logging for `app_name`.
///
/// `RUST_LOG`, when set, overrides `log_level`. Old rotated files beyond
/// `keep_files` are removed first.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the lifetime of the process.
pub fn setup_logging(log_dir: &Path, log_level: &str, app_name: &str, keep_files: usize) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir).with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let removed = cleanup_old_logs(log_dir, app_name, keep_files)?;

    let file_appender = rolling::daily(log_dir, app_name);
    let (non_blocking_appender, guard) = non_blocking(file_appender);

    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking_appender)
        .json();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .with_context(|| format!("invalid log level {log_level:?}"))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("installing global tracing subscriber")?;

    info!(level = log_level, dir = %log_dir.display(), removed, "logging initialized");
    Ok(guard)
}

/// Deletes rotated log files of `app_name` in `log_dir`, keeping the `keep`
/// most recently modified. Returns how many files were removed.
pub fn cleanup_old_logs(log_dir: &Path, app_name: &str, keep: usize) -> Result<usize> {
    let mut entries: Vec<(SystemTime, PathBuf)> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(app_name))
        .filter_map(|e| {
            let modified = e.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, e.path()))
        })
        .collect();

    // Newest first.
    entries.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in entries.iter().skip(keep) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Failed to delete old log file {:?}: {}", path, e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn touch(dir: &Path, name: &str, age_secs: u64) {
        let path = dir.join(name);
        fs::write(&path, b"{}").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs)).unwrap();
    }

    #[test]
    fn keeps_newest_files_of_the_app_only() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "server_attendance.2024-01-01", 300);
        touch(dir.path(), "server_attendance.2024-01-02", 200);
        touch(dir.path(), "server_attendance.2024-01-03", 100);
        touch(dir.path(), "other_app.2024-01-01", 400);

        let removed = cleanup_old_logs(dir.path(), "server_attendance", 2).unwrap();

        assert_eq!(removed, 1);
        assert!(!dir.path().join("server_attendance.2024-01-01").exists());
        assert!(dir.path().join("server_attendance.2024-01-02").exists());
        assert!(dir.path().join("server_attendance.2024-01-03").exists());
        assert!(dir.path().join("other_app.2024-01-01").exists());
    }

    #[test]
    fn empty_directory_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(dir.path(), "server_attendance", 0).unwrap(), 0);
    }
}
