//! Error types for the session supervision engine.
//!
//! Each failure kind in spec §7 that is *propagated* (rather than logged and
//! swallowed) gets a variant here. Errors that spec §7 calls out as
//! "logged and ignored" (dead PTY writes, invalid transitions, timer
//! misfires after delete) are never represented as `Result` — they are
//! `tracing::warn!`/`tracing::debug!` call sites at the point of occurrence.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while spawning or operating a PTY-backed child process.
#[derive(Debug, Error, Diagnostic)]
pub enum PtyError {
    /// The PTY pair could not be opened.
    #[error("failed to open pty: {0}")]
    OpenFailed(#[source] std::io::Error),
    /// The child command failed to spawn.
    #[error("failed to spawn command: {0}")]
    SpawnFailed(#[source] std::io::Error),
    /// A write to the PTY master failed.
    #[error("failed to write to pty: {0}")]
    WriteFailed(#[source] std::io::Error),
    /// A resize (`TIOCSWINSZ`) call failed.
    #[error("failed to resize pty: {0}")]
    ResizeFailed(#[source] std::io::Error),
    /// Sending a signal to the child's process group failed.
    #[error("failed to signal process group: {0}")]
    SignalFailed(#[source] nix::Error),
}

/// Errors raised by [`crate::pattern::PatternMatcher`] construction.
#[derive(Debug, Error, Diagnostic)]
#[error("invalid pattern in category {category:?} (index {index}): {source}")]
pub struct PatternCompileError {
    /// Pattern category the failing regex belongs to.
    pub category: String,
    /// Declaration-order index of the failing regex within its category.
    pub index: usize,
    /// Underlying regex compile error.
    #[source]
    pub source: regex::Error,
}

/// Errors raised loading and merging configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML or fails schema validation.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: Box<toml::de::Error>,
    },
    /// The default configuration could not be written to disk.
    #[error("failed to write default config to {path}: {source}")]
    Write {
        /// Path the default config was written to.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the supervisor's own operations (not by owned PTYs).
#[derive(Debug, Error, Diagnostic)]
pub enum SupervisorError {
    /// No session exists with the given id.
    #[error("no session with id {0}")]
    NotFound(crate::ids::SessionId),
    /// Spawning the session's child process failed (spec §7: propagated to caller).
    #[error("failed to create session: {0}")]
    Spawn(#[from] PtyError),
    /// Pattern compilation failed at session-creation time (spec §7: no
    /// partial matcher is ever installed).
    #[error("failed to compile session patterns: {0}")]
    Pattern(#[from] PatternCompileError),
}

/// Errors raised exporting a session transcript (spec §6 persisted state).
#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    /// The export directory could not be created.
    #[error("failed to create export directory {path}: {source}")]
    CreateDir {
        /// Directory that failed to create.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The transcript file could not be written.
    #[error("failed to write transcript to {path}: {source}")]
    Write {
        /// File that failed to write.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
