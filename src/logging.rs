//! File-based diagnostics via the tracing crate.
//!
//! Logs go to a daily-rotated file under the XDG state directory, never to
//! the terminal, so transcripts on stdout stay pipeable. Old log files are
//! pruned at startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

const LOG_FILE_PREFIX: &str = "poolscribe.log";
/// Daily files retained after the startup prune.
const RETAINED_LOG_FILES: usize = 7;

// Keeps the non-blocking writer flushing for the life of the process.
static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Sets up the daily-rolling file subscriber.
///
/// The level is taken from `RUST_LOG` and defaults to `info`.
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> Result<()> {
    let log_dir = log_dir()?;

    if let Err(e) = prune_old_logs(&log_dir) {
        eprintln!("Warning: failed to prune old logs: {e}");
    }

    let (writer, guard) =
        tracing_appender::non_blocking(rolling::daily(&log_dir, LOG_FILE_PREFIX));
    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow!("Logging already initialized"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_ansi(false),
        )
        .init();

    tracing::debug!("Logging initialized. Log directory: {}", log_dir.display());
    Ok(())
}

/// Resolves `$XDG_STATE_HOME/poolscribe` (or `~/.local/state/poolscribe`),
/// creating it if needed.
fn log_dir() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
        .ok_or_else(|| anyhow!("Could not determine state directory"))?;
    let dir = base.join("poolscribe");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Deletes dated log files beyond the newest `RETAINED_LOG_FILES`.
fn prune_old_logs(log_dir: &Path) -> Result<()> {
    let mut dated: Vec<(PathBuf, std::time::SystemTime)> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let name = path.file_name()?.to_string_lossy().to_string();
            // The appender names rotated files poolscribe.log.YYYY-MM-DD.
            if !name.starts_with(LOG_FILE_PREFIX) || name.matches('-').count() != 2 {
                return None;
            }
            let modified = fs::metadata(&path).ok()?.modified().ok()?;
            Some((path, modified))
        })
        .collect();

    dated.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in dated.into_iter().skip(RETAINED_LOG_FILES) {
        if let Err(e) = fs::remove_file(&path) {
            eprintln!("Warning: failed to delete old log {}: {e}", path.display());
        }
    }

    Ok(())
}
