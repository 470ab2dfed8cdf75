//! Logging setup (spec §6: file logging, level configurable). Stdout/stderr
//! are reserved for the TUI itself, so all output goes to a rolling file via
//! `tracing-appender`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber to write to `log_file` (daily
/// rolling) at `level` (an `EnvFilter` directive, e.g. `"info"` or
/// `"tame_core=debug,warn"`). Returns the [`WorkerGuard`] the caller must
/// keep alive for the process lifetime, or logging silently stops.
///
/// # Panics
/// Panics if a global subscriber has already been installed; callers must
/// invoke this exactly once, at startup.
#[must_use]
pub fn init(log_file: &Path, level: &str) -> WorkerGuard {
    let directory = log_file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let filename = log_file.file_name().and_then(|n| n.to_str()).unwrap_or("tame.log");

    let file_appender = tracing_appender::rolling::daily(directory, filename);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    guard
}
