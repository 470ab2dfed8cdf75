//! Per-session aggregate (spec §3, §4.E).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::buffer::{OutputBuffer, DEFAULT_MAX_LINES};
use crate::ids::SessionId;
use crate::input::{InputHistory, Key, KeyEvent, LineEditor, DEFAULT_HISTORY_CAP};
use crate::pattern::PatternMatcher;
use crate::pty::PtyChild;
use crate::state::{AttentionState, DisplayState, ProcessState, StateModel};
use crate::usage::UsageInfo;

/// Configuration used when constructing a [`SessionCore`].
pub struct SessionCoreConfig {
    /// User-editable display name.
    pub name: String,
    /// Working directory the child was started in.
    pub cwd: String,
    /// Optional grouping tag.
    pub group: Option<String>,
    /// Per-session output buffer cap.
    pub max_buffer_lines: usize,
    /// Debounce window for the state model.
    pub state_debounce: Duration,
}

/// A supervised child process plus all state observed about it.
pub struct SessionCore {
    id: SessionId,
    name: String,
    cwd: String,
    group: Option<String>,
    created_at: Instant,
    last_activity: Instant,
    exit_code: Option<i32>,
    pty: PtyChild,
    buffer: OutputBuffer,
    matcher: PatternMatcher,
    state: StateModel,
    usage: UsageInfo,
    input_history: InputHistory,
    line_editor: LineEditor,
    metadata: HashMap<String, String>,
    scan_partial: String,
}

impl SessionCore {
    /// Construct a new session wrapping an already-spawned [`PtyChild`].
    #[must_use]
    pub fn new(id: SessionId, config: SessionCoreConfig, pty: PtyChild, matcher: PatternMatcher) -> Self {
        let now = Instant::now();
        Self {
            id,
            name: config.name,
            cwd: config.cwd,
            group: config.group,
            created_at: now,
            last_activity: now,
            exit_code: None,
            pty,
            buffer: OutputBuffer::new(config.max_buffer_lines),
            matcher,
            state: StateModel::new(config.state_debounce),
            usage: UsageInfo::default(),
            input_history: InputHistory::new(DEFAULT_HISTORY_CAP),
            line_editor: LineEditor::new(),
            metadata: HashMap::new(),
            scan_partial: String::new(),
        }
    }

    /// Opaque session id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the session.
    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Working directory the child was started in.
    #[must_use]
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Optional grouping tag.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Set (or clear) the grouping tag.
    pub fn set_group(&mut self, group: Option<String>) {
        self.group = group;
    }

    /// Derived display state (spec §3).
    #[must_use]
    pub fn status(&self) -> DisplayState {
        self.state.display()
    }

    /// Raw process axis.
    #[must_use]
    pub fn process_state(&self) -> ProcessState {
        self.state.process()
    }

    /// Raw attention axis.
    #[must_use]
    pub fn attention_state(&self) -> AttentionState {
        self.state.attention()
    }

    /// Exit code, set only once `process_state() == Exited`.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Last time output was received or input was sent.
    #[must_use]
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Read-only view of the output buffer.
    #[must_use]
    pub fn buffer(&self) -> &OutputBuffer {
        &self.buffer
    }

    /// Read-only view of usage/quota info.
    #[must_use]
    pub fn usage(&self) -> &UsageInfo {
        &self.usage
    }

    /// Read-only view of the committed input history.
    #[must_use]
    pub fn input_history(&self) -> &InputHistory {
        &self.input_history
    }

    /// Mutable handle, e.g. for a caller driving [`crate::input::LineEditor`]
    /// commits directly.
    pub fn input_history_mut(&mut self) -> &mut InputHistory {
        &mut self.input_history
    }

    /// Opaque string metadata (multiplexer session name, worktree path).
    #[must_use]
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Insert or overwrite a metadata entry.
    pub fn set_metadata(&mut self, key: String, value: String) {
        self.metadata.insert(key, value);
    }

    /// Borrow the owned PTY child.
    pub fn pty_mut(&mut self) -> &mut PtyChild {
        &mut self.pty
    }

    /// Borrow the pattern matcher (used by the supervisor to scan chunks).
    #[must_use]
    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// The unscanned partial tail retained across chunks (spec §4.F step 5).
    #[must_use]
    pub fn scan_partial(&self) -> &str {
        &self.scan_partial
    }

    /// Replace the scan partial tail.
    pub fn set_scan_partial(&mut self, partial: String) {
        self.scan_partial = partial;
    }

    /// Drive the output buffer, mark activity, clear `IDLE` attention, and
    /// promote `STARTING` to `RUNNING` on first observed output (spec §3:
    /// "create → STARTING → RUNNING (on first output)"). Idle/weak-prompt
    /// timer management is the supervisor's responsibility (spec §4.F is
    /// the sole timer owner); this only updates the data this session
    /// directly owns.
    pub fn append_output(&mut self, text: &str, now: Instant) {
        self.buffer.append(text);
        self.last_activity = now;
        if self.state.process() == ProcessState::Starting {
            self.state.set_process(ProcessState::Running, now);
        }
        if self.state.attention() == AttentionState::Idle {
            self.state.set_attention(AttentionState::None, now);
        }
    }

    /// Attempt a process-state transition at `now`.
    pub fn set_process(&mut self, target: ProcessState, now: Instant) -> bool {
        self.state.set_process(target, now)
    }

    /// Attempt an attention-state transition at `now`.
    pub fn set_attention(&mut self, target: AttentionState, now: Instant) -> bool {
        self.state.set_attention(target, now)
    }

    /// Mark the process exited with `code`, per spec §3's invariant that
    /// `exit_code` is set iff EXITED.
    pub fn mark_exited(&mut self, code: Option<i32>, now: Instant) {
        if self.state.set_process(ProcessState::Exited, now) {
            self.exit_code = code;
        }
    }

    /// Scan newly observed text against the built-in usage regex set,
    /// line by line (spec §4.F step 7).
    pub fn scan_usage(&mut self, complete_lines: &[String]) {
        for line in complete_lines {
            self.usage.update_from_line(line);
        }
    }

    /// Fold a forwarded key event into the session's line buffer and, on
    /// Enter, commit the accumulated line to input history (spec §4.J).
    /// Independent of whether the key's bytes are written to the PTY;
    /// tracks what the user composed rather than what the PTY echoes back.
    pub fn track_input_key(&mut self, event: KeyEvent) {
        if event.modifiers.ctrl {
            if matches!(event.key, Key::Char('c' | 'C')) {
                self.line_editor.discard();
            }
            return;
        }
        match event.key {
            Key::Char(ch) => self.line_editor.push(ch),
            Key::Backspace => self.line_editor.backspace(),
            Key::Enter => {
                let line = self.line_editor.take();
                if !line.is_empty() {
                    self.input_history.commit(line);
                }
            }
            _ => {}
        }
    }

    /// `send_input` semantics (spec §4.F): write bytes, mark activity,
    /// clear non-NONE attention. Idle-timer reset is the supervisor's job.
    ///
    /// # Errors
    /// Propagates [`crate::error::PtyError`] from the underlying write.
    pub fn send_input(&mut self, bytes: &[u8], now: Instant) -> Result<(), crate::error::PtyError> {
        self.pty.write(bytes)?;
        self.last_activity = now;
        match self.state.attention() {
            AttentionState::NeedsInput | AttentionState::ErrorSeen | AttentionState::Idle => {
                self.state.set_attention(AttentionState::None, now);
            }
            AttentionState::None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn matcher() -> PatternMatcher {
        let mut patterns = IndexMap::new();
        patterns.insert("error".to_string(), vec![r"error".to_string()]);
        patterns.insert("prompt".to_string(), vec![r"\?\s*$".to_string()]);
        PatternMatcher::new(&patterns).expect("compiles")
    }

    fn session() -> SessionCore {
        let pty = PtyChild::spawn(&crate::pty::PtySpawnConfig {
            command: "/bin/cat".to_string(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            rows: 24,
            cols: 80,
        })
        .expect("spawn cat");
        SessionCore::new(
            SessionId::new(),
            SessionCoreConfig {
                name: "test".to_string(),
                cwd: "/tmp".to_string(),
                group: None,
                max_buffer_lines: DEFAULT_MAX_LINES,
                state_debounce: Duration::from_millis(0),
            },
            pty,
            matcher(),
        )
    }

    #[test]
    fn append_output_clears_idle_attention() {
        let mut core = session();
        let t0 = Instant::now();
        core.set_process(ProcessState::Running, t0);
        core.set_attention(AttentionState::Idle, t0);
        core.append_output("more output\n", t0 + Duration::from_millis(1));
        assert_eq!(core.attention_state(), AttentionState::None);
    }

    #[test]
    fn append_output_promotes_starting_to_running_on_first_output() {
        let mut core = session();
        let t0 = Instant::now();
        assert_eq!(core.process_state(), ProcessState::Starting);
        core.append_output("first line\n", t0);
        assert_eq!(core.process_state(), ProcessState::Running);
    }

    #[test]
    fn send_input_clears_needs_input() {
        let mut core = session();
        let t0 = Instant::now();
        core.set_process(ProcessState::Running, t0);
        core.set_attention(AttentionState::NeedsInput, t0);
        core.send_input(b"y\n", t0 + Duration::from_millis(1)).expect("write");
        assert_eq!(core.attention_state(), AttentionState::None);
    }

    #[test]
    fn mark_exited_sets_exit_code_only_once() {
        let mut core = session();
        let t0 = Instant::now();
        core.set_process(ProcessState::Running, t0);
        core.mark_exited(Some(0), t0 + Duration::from_millis(1));
        assert_eq!(core.exit_code(), Some(0));
        core.mark_exited(Some(1), t0 + Duration::from_millis(2));
        assert_eq!(core.exit_code(), Some(0));
    }

    #[test]
    fn usage_scan_updates_from_complete_lines() {
        let mut core = session();
        core.scan_usage(&["Claude messages: 3/40 remaining".to_string()]);
        assert_eq!(core.usage().messages_used, Some(3));
    }

    fn plain(key: crate::input::Key) -> crate::input::KeyEvent {
        crate::input::KeyEvent {
            key,
            modifiers: crate::input::Modifiers::default(),
        }
    }

    #[test]
    fn enter_commits_composed_line_to_history() {
        let mut core = session();
        core.track_input_key(plain(crate::input::Key::Char('l')));
        core.track_input_key(plain(crate::input::Key::Char('s')));
        core.track_input_key(plain(crate::input::Key::Enter));
        assert_eq!(core.input_history().entries(), vec!["ls".to_string()]);
    }

    #[test]
    fn backspace_pops_and_empty_line_does_not_commit() {
        let mut core = session();
        core.track_input_key(plain(crate::input::Key::Char('x')));
        core.track_input_key(plain(crate::input::Key::Backspace));
        core.track_input_key(plain(crate::input::Key::Enter));
        assert!(core.input_history().entries().is_empty());
    }

    #[test]
    fn ctrl_c_discards_without_committing() {
        let mut core = session();
        core.track_input_key(plain(crate::input::Key::Char('r')));
        core.track_input_key(plain(crate::input::Key::Char('m')));
        core.track_input_key(crate::input::KeyEvent {
            key: crate::input::Key::Char('c'),
            modifiers: crate::input::Modifiers {
                ctrl: true,
                alt: false,
                shift: false,
            },
        });
        core.track_input_key(plain(crate::input::Key::Enter));
        assert!(core.input_history().entries().is_empty());
    }
}
