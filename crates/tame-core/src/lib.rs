//! Session supervision engine for `tame`, a multi-session terminal
//! supervisor TUI: PTY lifecycle, an output classification pipeline, a
//! dual-axis process/attention state machine, a multi-session terminal
//! emulator/viewport cache, and notification routing.
//!
//! This crate has no UI dependency; [`tame-cli`] (the binary crate) drives
//! it from a reactor loop and renders the result with `ratatui`.

pub mod ansi;
pub mod buffer;
pub mod config;
pub mod error;
pub mod export;
pub mod ids;
pub mod input;
pub mod logging;
pub mod notify;
pub mod pattern;
pub mod pty;
pub mod resource;
pub mod session;
pub mod sinks;
pub mod state;
pub mod supervisor;
pub mod terminal;
pub mod tmux;
pub mod usage;
pub mod viewport;

pub use error::{ConfigError, ExportError, PatternCompileError, PtyError, SupervisorError};
pub use ids::{NotificationId, SessionId};
pub use session::{SessionCore, SessionCoreConfig};
pub use state::{AttentionState, DisplayState, ProcessState};
pub use supervisor::{ChunkOutcome, CreateSessionParams, SessionSupervisor, SupervisorConfig};
