//! Session transcript export (spec §6): flatten a session's scrollback to
//! plain text and write it to disk. The timestamp is supplied by the caller
//! rather than read from the clock in here, so the function stays pure and
//! testable without faking wall-clock time.

use std::path::{Path, PathBuf};

use crate::error::ExportError;

/// Write `transcript` (already assembled scrollback text, ANSI included) to
/// `<dir>/<sanitized name>_<timestamp>.txt`, stripping ANSI control
/// sequences first. `timestamp` is caller-formatted (e.g. `20260727_140501`)
/// so this function never touches the clock itself.
///
/// # Errors
/// [`ExportError::CreateDir`] if `dir` can't be created;
/// [`ExportError::Write`] if the transcript file can't be written.
pub fn export_session(name: &str, transcript: &str, dir: &Path, timestamp: &str) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let plain = crate::ansi::strip_ansi(transcript);
    let path = dir.join(format!("{}_{timestamp}.txt", sanitize_filename(name)));
    std::fs::write(&path, plain).map_err(|source| ExportError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Replace anything that isn't alphanumeric, `-`, or `_` with `_`, so the
/// session's display name is always a safe single path component.
fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "session".to_string()
    } else {
        sanitized
    }
}
