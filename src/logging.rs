use once_cell::sync::OnceCell;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::TopologyError;

const MAX_LOG_FILES: usize = 7; // Keep 7 days of logs
const LOG_FILE_PREFIX: &str = "nexa-topology";

static INITIALIZED: OnceCell<()> = OnceCell::new();
// Flushes the file writer; must outlive the process' logging
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(config: &LoggingConfig) -> Result<(), TopologyError> {
    if INITIALIZED.set(()).is_err() {
        return Ok(());
    }

    // Route `log` records through tracing; fails only if a logger already exists
    let _ = tracing_log::LogTracer::init();

    let console = fmt::Layer::new()
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter(&config.level));

    let file = if config.json_file {
        fs::create_dir_all(&config.directory)?;

        let appender = tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .build(&config.directory)
            .map_err(|e| TopologyError::config(format!("Failed to create log appender: {}", e)))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);

        Some(
            fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_target(true)
                .with_ansi(false)
                .with_filter(env_filter(&config.level)),
        )
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry().with(console).with(file);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| TopologyError::config(format!("Failed to set tracing subscriber: {}", e)))?;

    if config.json_file {
        match prune_log_files(&config.directory, MAX_LOG_FILES) {
            Ok(0) => {}
            Ok(removed) => debug!("Pruned {} old log files from {}", removed, config.directory.display()),
            Err(e) => warn!("Could not prune log directory {}: {}", config.directory.display(), e),
        }
    }
    Ok(())
}

/// Delete all but the `keep` most recent rolled log files of this crate.
///
/// Files not written by our appender are left alone. Returns how many files
/// were removed; a file that cannot be removed is reported and skipped.
fn prune_log_files(log_dir: &Path, keep: usize) -> io::Result<usize> {
    let mut rolled = Vec::new();
    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let ours = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX) && name.ends_with(".log"));
        if !ours || !path.is_file() {
            continue;
        }
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        rolled.push((modified, path));
    }

    // Newest first; ties broken by name so the dated suffix decides
    rolled.sort_by(|a, b| b.cmp(a));

    let mut removed = 0;
    for (_, path) in rolled.into_iter().skip(keep) {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to remove old log file {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}
