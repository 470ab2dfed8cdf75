//! CRUD, PTY fan-in, pattern dispatch, and timer orchestration (spec §4.F).
//!
//! The supervisor is the single owner of every per-session timer (idle,
//! weak-prompt) and of the scan-partial tracking used by the pattern
//! pipeline; no other component schedules session-state-affecting work.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::ansi::strip_ansi;
use crate::error::SupervisorError;
use crate::ids::SessionId;
use crate::pattern::PatternMatcher;
use crate::pty::{PtyChild, PtySpawnConfig};
use crate::state::{AttentionState, ProcessState};
use crate::session::{SessionCore, SessionCoreConfig};

/// Default idle threshold (spec §4.F).
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(300);
/// Default weak-prompt arm-to-fire delay (spec §4.F).
pub const DEFAULT_IDLE_PROMPT_TIMEOUT: Duration = Duration::from_secs(3);

/// Chunk-delivery batching (spec §5): pending output at or under this many
/// bytes flushes immediately rather than waiting for the batch timer.
pub const BATCH_SIZE_THRESHOLD: usize = 64;
/// Larger pending batches flush once this much time has passed since the
/// first byte was buffered (spec §5, ~60 Hz).
pub const BATCH_FLUSH_INTERVAL: Duration = Duration::from_millis(16);

/// Accumulated, not-yet-delivered output for one session's chunk-delivery
/// batch (spec §5).
struct PendingRender {
    text: String,
    first_pending_at: Instant,
}

/// Whether `text` contains a cursor-move, clear, or CR-redraw control
/// sequence that must bypass batching (spec §5) because delaying it behind
/// a burst would produce visual artifacts.
fn contains_redraw_control(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    while let Some(&byte) = bytes.get(i) {
        match byte {
            b'\r' if bytes.get(i + 1) != Some(&b'\n') => return true,
            0x1b if bytes.get(i + 1) == Some(&b'[') => {
                let mut j = i + 2;
                while bytes.get(j).is_some_and(|b| !b.is_ascii_alphabetic()) {
                    j += 1;
                }
                if matches!(bytes.get(j), Some(b'A' | b'B' | b'C' | b'D' | b'H' | b'f' | b'J' | b'K')) {
                    return true;
                }
                i = j;
            }
            _ => {}
        }
        i += 1;
    }
    false
}

/// Tunables that apply to every session the supervisor creates.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Per-session output buffer cap.
    pub max_buffer_lines: usize,
    /// State-model debounce window.
    pub state_debounce: Duration,
    /// Idle threshold before attention becomes `Idle`.
    pub idle_threshold: Duration,
    /// Delay between a weak-prompt match and attention becoming `NeedsInput`.
    pub idle_prompt_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_buffer_lines: crate::buffer::DEFAULT_MAX_LINES,
            state_debounce: crate::state::DEFAULT_DEBOUNCE,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            idle_prompt_timeout: DEFAULT_IDLE_PROMPT_TIMEOUT,
        }
    }
}

/// Parameters for [`SessionSupervisor::create`].
pub struct CreateSessionParams {
    /// Display name.
    pub name: String,
    /// Working directory.
    pub cwd: String,
    /// Command to run (shell is used if `None`).
    pub command: Option<String>,
    /// Arguments for `command`.
    pub args: Vec<String>,
    /// Optional grouping tag.
    pub group: Option<String>,
    /// Initial terminal size.
    pub rows: u16,
    /// Initial terminal size.
    pub cols: u16,
    /// Base patterns (category → ordered regex sources).
    pub base_patterns: IndexMap<String, Vec<String>>,
    /// Optional profile patterns merged onto the base set (profile patterns
    /// are appended after base patterns within each category, preserving
    /// the base set's declaration-order priority).
    pub profile_patterns: Option<IndexMap<String, Vec<String>>>,
}

fn merge_patterns(
    base: &IndexMap<String, Vec<String>>,
    profile: Option<&IndexMap<String, Vec<String>>>,
) -> IndexMap<String, Vec<String>> {
    let mut merged = base.clone();
    if let Some(profile) = profile {
        for (category, sources) in profile {
            merged.entry(category.clone()).or_default().extend(sources.clone());
        }
    }
    merged
}

/// The result of running the output-processing pipeline (spec §4.F) on one
/// chunk, reported back so a caller (e.g. the reactor glue in `tame-cli`)
/// can feed the terminal emulator and notification engine.
#[derive(Debug, Default)]
pub struct ChunkOutcome {
    /// The raw decoded chunk text (ANSI intact), for feeding a terminal
    /// emulator cache. `None` on an EOF chunk or an empty poll.
    pub raw_text: Option<String>,
    /// Complete lines produced by this chunk (after ANSI stripping),
    /// for usage scanning and UI delivery.
    pub complete_lines: Vec<String>,
    /// Whether the session's process transitioned to `Exited` this chunk.
    pub exited: bool,
    /// Whether attention became `ErrorSeen` this chunk.
    pub error_seen: bool,
    /// Whether attention became `NeedsInput` this chunk.
    pub needs_input: bool,
    /// The matched text responsible for `error_seen`/`needs_input`, if any.
    pub matched_text: Option<String>,
    /// Whether a weak-prompt timer was (re)armed this chunk.
    pub weak_prompt_armed: bool,
}

/// Owns every [`SessionCore`] and drives the shared output-classification
/// pipeline and timers across all of them.
pub struct SessionSupervisor {
    sessions: HashMap<SessionId, SessionCore>,
    idle_deadlines: HashMap<SessionId, Instant>,
    weak_prompt_deadlines: HashMap<SessionId, (Instant, String)>,
    pending_render: HashMap<SessionId, PendingRender>,
    config: SupervisorConfig,
}

impl SessionSupervisor {
    /// Construct an empty supervisor with the given tunables.
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_deadlines: HashMap::new(),
            weak_prompt_deadlines: HashMap::new(),
            pending_render: HashMap::new(),
            config,
        }
    }

    /// Spawn a child and register a new session for it.
    ///
    /// # Errors
    /// Propagates spawn and pattern-compile failures (spec §7: "surfaced to
    /// the caller of create; session is not registered").
    pub fn create(&mut self, params: CreateSessionParams, now: Instant) -> Result<SessionId, SupervisorError> {
        let command = params.command.unwrap_or_else(|| {
            std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
        });
        let pty = PtyChild::spawn(&PtySpawnConfig {
            command,
            args: params.args,
            cwd: Some(params.cwd.clone()),
            env: vec![("TERM".to_string(), "xterm-256color".to_string())],
            rows: params.rows,
            cols: params.cols,
        })?;

        let merged = merge_patterns(&params.base_patterns, params.profile_patterns.as_ref());
        let matcher = PatternMatcher::new(&merged)?;

        let id = SessionId::new();
        let core = SessionCore::new(
            id,
            SessionCoreConfig {
                name: params.name,
                cwd: params.cwd,
                group: params.group,
                max_buffer_lines: self.config.max_buffer_lines,
                state_debounce: self.config.state_debounce,
            },
            pty,
            matcher,
        );
        self.sessions.insert(id, core);
        self.idle_deadlines.insert(id, now + self.config.idle_threshold);
        Ok(id)
    }

    /// Remove a session and cancel its timers. The session's `Drop`
    /// terminates its child process group.
    pub fn delete(&mut self, id: SessionId) {
        self.sessions.remove(&id);
        self.idle_deadlines.remove(&id);
        self.weak_prompt_deadlines.remove(&id);
        self.pending_render.remove(&id);
    }

    /// Borrow a session.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<&SessionCore> {
        self.sessions.get(&id)
    }

    /// Mutably borrow a session.
    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut SessionCore> {
        self.sessions.get_mut(&id)
    }

    /// All session ids, in arbitrary order.
    #[must_use]
    pub fn list(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    /// Rename a session.
    ///
    /// # Errors
    /// [`SupervisorError::NotFound`] if `id` doesn't exist.
    pub fn rename(&mut self, id: SessionId, name: String) -> Result<(), SupervisorError> {
        self.sessions
            .get_mut(&id)
            .map(|s| s.set_name(name))
            .ok_or(SupervisorError::NotFound(id))
    }

    /// Set a session's group tag.
    ///
    /// # Errors
    /// [`SupervisorError::NotFound`] if `id` doesn't exist.
    pub fn set_group(&mut self, id: SessionId, group: Option<String>) -> Result<(), SupervisorError> {
        self.sessions
            .get_mut(&id)
            .map(|s| s.set_group(group))
            .ok_or(SupervisorError::NotFound(id))
    }

    /// Suspend a session's process group (`SIGSTOP`) and move it to
    /// `Paused`.
    ///
    /// # Errors
    /// Propagates signal failures; [`SupervisorError::NotFound`] if `id`
    /// doesn't exist.
    pub fn pause(&mut self, id: SessionId, now: Instant) -> Result<(), SupervisorError> {
        let session = self.sessions.get_mut(&id).ok_or(SupervisorError::NotFound(id))?;
        session.pty_mut().pause().map_err(SupervisorError::Spawn)?;
        session.set_process(ProcessState::Paused, now);
        Ok(())
    }

    /// Resume a paused session (`SIGCONT`) and move it back to `Running`.
    ///
    /// # Errors
    /// Propagates signal failures; [`SupervisorError::NotFound`] if `id`
    /// doesn't exist.
    pub fn resume(&mut self, id: SessionId, now: Instant) -> Result<(), SupervisorError> {
        let session = self.sessions.get_mut(&id).ok_or(SupervisorError::NotFound(id))?;
        session.pty_mut().resume().map_err(SupervisorError::Spawn)?;
        session.set_process(ProcessState::Running, now);
        Ok(())
    }

    /// Pause every session currently running.
    pub fn pause_all(&mut self, now: Instant) {
        let ids: Vec<_> = self.sessions.keys().copied().collect();
        for id in ids {
            let _ = self.pause(id, now);
        }
    }

    /// Resume every paused session.
    pub fn resume_all(&mut self, now: Instant) {
        let ids: Vec<_> = self.sessions.keys().copied().collect();
        for id in ids {
            let _ = self.resume(id, now);
        }
    }

    /// Terminate every session's child process.
    pub fn stop_all(&mut self, grace: Duration) {
        for session in self.sessions.values_mut() {
            let _ = session.pty_mut().terminate(grace);
        }
    }

    /// Terminate and remove every session.
    pub fn close_all(&mut self, grace: Duration) {
        self.stop_all(grace);
        self.sessions.clear();
        self.idle_deadlines.clear();
        self.weak_prompt_deadlines.clear();
        self.pending_render.clear();
    }

    /// `send_input` (spec §4.F): write bytes, reset the idle timer.
    ///
    /// # Errors
    /// [`SupervisorError::NotFound`] if `id` doesn't exist; otherwise
    /// propagates the underlying PTY write failure.
    pub fn send_input(&mut self, id: SessionId, text: &[u8], now: Instant) -> Result<(), SupervisorError> {
        let session = self.sessions.get_mut(&id).ok_or(SupervisorError::NotFound(id))?;
        session.send_input(text, now).map_err(SupervisorError::Spawn)?;
        self.idle_deadlines.insert(id, now + self.config.idle_threshold);
        Ok(())
    }

    /// Resize a session's PTY.
    ///
    /// # Errors
    /// [`SupervisorError::NotFound`] if `id` doesn't exist; otherwise
    /// propagates the resize failure.
    pub fn resize(&mut self, id: SessionId, rows: u16, cols: u16) -> Result<(), SupervisorError> {
        let session = self.sessions.get_mut(&id).ok_or(SupervisorError::NotFound(id))?;
        session.pty_mut().resize(rows, cols).map_err(SupervisorError::Spawn)
    }

    /// Chunk-delivery batching (spec §5): accumulate `text` into `id`'s
    /// pending render buffer and return `Some` with the text to deliver now
    /// if the batch should flush (small pending total, redraw-control
    /// bypass, or the 16 ms timer elapsed), else `None` to keep buffering.
    fn batch_for_render(&mut self, id: SessionId, text: &str, now: Instant) -> Option<String> {
        let bypass = contains_redraw_control(text);
        let pending = self.pending_render.entry(id).or_insert_with(|| PendingRender {
            text: String::new(),
            first_pending_at: now,
        });
        if pending.text.is_empty() {
            pending.first_pending_at = now;
        }
        pending.text.push_str(text);

        let small = pending.text.len() <= BATCH_SIZE_THRESHOLD;
        let timer_elapsed = now.duration_since(pending.first_pending_at) >= BATCH_FLUSH_INTERVAL;
        if bypass || small || timer_elapsed {
            Some(std::mem::take(&mut pending.text))
        } else {
            None
        }
    }

    /// Flush `id`'s pending render batch if the 16 ms timer has elapsed
    /// since it first started buffering, even though no new chunk arrived
    /// this tick (spec §5's timer-driven flush suspension point).
    fn flush_due_pending(&mut self, id: SessionId, now: Instant) -> ChunkOutcome {
        let mut outcome = ChunkOutcome::default();
        if let Some(pending) = self.pending_render.get_mut(&id) {
            if !pending.text.is_empty() && now.duration_since(pending.first_pending_at) >= BATCH_FLUSH_INTERVAL {
                outcome.raw_text = Some(std::mem::take(&mut pending.text));
            }
        }
        outcome
    }

    fn split_lines_tracking_partial(previous_partial: &str, new_text: &str) -> (Vec<String>, String) {
        let mut combined = previous_partial.to_string();
        combined.push_str(new_text);
        let mut parts: Vec<String> = combined.split('\n').map(str::to_string).collect();
        let partial = parts.pop().unwrap_or_default();
        (parts, partial)
    }

    /// Run the output-processing pipeline (spec §4.F steps 1-7) on one
    /// chunk. `chunk = None` signals EOF.
    ///
    /// # Errors
    /// [`SupervisorError::NotFound`] if `id` doesn't exist.
    pub fn on_pty_chunk(
        &mut self,
        id: SessionId,
        chunk: Option<&[u8]>,
        exit_code: Option<i32>,
        now: Instant,
    ) -> Result<ChunkOutcome, SupervisorError> {
        let session = self.sessions.get_mut(&id).ok_or(SupervisorError::NotFound(id))?;
        let mut outcome = ChunkOutcome::default();

        let Some(bytes) = chunk else {
            // Step 1: EOF.
            session.set_scan_partial(String::new());
            if let Some(code) = exit_code {
                if code != 0 {
                    session.set_attention(AttentionState::ErrorSeen, now);
                    outcome.error_seen = true;
                }
            }
            session.mark_exited(exit_code, now);
            outcome.exited = true;
            if let Some(pending) = self.pending_render.remove(&id) {
                if !pending.text.is_empty() {
                    outcome.raw_text = Some(pending.text);
                }
            }
            self.idle_deadlines.remove(&id);
            self.weak_prompt_deadlines.remove(&id);
            return Ok(outcome);
        };

        // Step 2: decode (replacement on invalid), append, reset idle timer.
        let text = String::from_utf8_lossy(bytes).into_owned();
        session.append_output(&text, now);
        outcome.raw_text = self.batch_for_render(id, &text, now);
        self.idle_deadlines.insert(id, now + self.config.idle_threshold);
        self.weak_prompt_deadlines.remove(&id);

        // Step 3: strip ANSI, concatenate with scan partial, split on '\n'.
        let stripped = strip_ansi(&text);
        let previous_partial = session.scan_partial().to_string();
        let (complete_lines, new_partial) =
            Self::split_lines_tracking_partial(&previous_partial, &stripped);

        // Step 4: scan complete lines, last-match-wins within the chunk.
        let mut last_attention_match: Option<(&'static str, String)> = None;
        let mut completion_matched = false;
        for line in &complete_lines {
            if let Some(found) = session.matcher().scan(line) {
                match found.category.as_str() {
                    "error" => last_attention_match = Some(("error", found.matched_text)),
                    "prompt" => last_attention_match = Some(("prompt", found.matched_text)),
                    "weak_prompt" => last_attention_match = Some(("weak_prompt", found.matched_text)),
                    "completion" => completion_matched = true,
                    _ => {}
                }
            }
        }

        // Step 5: rescan the partial tail only if it changed.
        if new_partial != previous_partial {
            if let Some(found) = session.matcher().scan(&new_partial) {
                if matches!(found.category.as_str(), "prompt" | "weak_prompt") {
                    last_attention_match = Some((
                        if found.category == "prompt" { "prompt" } else { "weak_prompt" },
                        found.matched_text,
                    ));
                }
            }
        }
        session.set_scan_partial(new_partial);

        // Step 6: apply.
        if completion_matched {
            session.mark_exited(None, now);
            outcome.exited = true;
        }
        match last_attention_match {
            Some(("error", text)) => {
                if session.set_attention(AttentionState::ErrorSeen, now) {
                    outcome.error_seen = true;
                    outcome.matched_text = Some(text);
                }
            }
            Some(("prompt", text)) => {
                if session.set_attention(AttentionState::NeedsInput, now) {
                    outcome.needs_input = true;
                    outcome.matched_text = Some(text);
                }
            }
            Some(("weak_prompt", text)) => {
                self.weak_prompt_deadlines
                    .insert(id, (now + self.config.idle_prompt_timeout, text));
                outcome.weak_prompt_armed = true;
            }
            _ => {}
        }

        // Step 7: usage scan.
        session.scan_usage(&complete_lines);

        outcome.complete_lines = complete_lines;
        Ok(outcome)
    }

    /// Non-blocking drain of one session's PTY: reads whatever is currently
    /// available (possibly nothing), detects process exit, and feeds the
    /// result through [`Self::on_pty_chunk`]. Intended to be called by the
    /// reactor's per-tick poll over all live sessions (spec §5's PTY
    /// readiness suspension point, modeled here as polling since this
    /// engine has no OS readiness notifier of its own).
    ///
    /// # Errors
    /// [`SupervisorError::NotFound`] if `id` doesn't exist;
    /// [`SupervisorError::Spawn`] if the underlying read fails for a reason
    /// other than EOF.
    pub fn poll(&mut self, id: SessionId, now: Instant) -> Result<ChunkOutcome, SupervisorError> {
        let session = self.sessions.get_mut(&id).ok_or(SupervisorError::NotFound(id))?;
        if let Some(status) = session.pty_mut().wait_for_exit(Duration::from_millis(0)) {
            return self.on_pty_chunk(id, None, status.exit_code().try_into().ok(), now);
        }
        let bytes = session.pty_mut().try_read().map_err(SupervisorError::Spawn)?;
        if bytes.is_empty() {
            return Ok(self.flush_due_pending(id, now));
        }
        self.on_pty_chunk(id, Some(&bytes), None, now)
    }

    /// Apply a snapshot scan (spec §4.F "Snapshot scan") to externally
    /// captured text without mutating the session's `OutputBuffer`.
    ///
    /// # Errors
    /// [`SupervisorError::NotFound`] if `id` doesn't exist.
    pub fn scan_snapshot(&mut self, id: SessionId, text: &str, now: Instant) -> Result<(), SupervisorError> {
        let session = self.sessions.get_mut(&id).ok_or(SupervisorError::NotFound(id))?;
        let stripped = strip_ansi(text);
        let mut lines: Vec<&str> = stripped.split('\n').collect();
        let final_partial = lines.pop().unwrap_or("");

        let mut last_attention_match: Option<(&'static str, String)> = None;
        let mut completion_matched = false;
        for line in &lines {
            if let Some(found) = session.matcher().scan(line) {
                match found.category.as_str() {
                    "error" => last_attention_match = Some(("error", found.matched_text)),
                    "prompt" => last_attention_match = Some(("prompt", found.matched_text)),
                    "completion" => completion_matched = true,
                    _ => {}
                }
            }
        }
        if let Some(found) = session.matcher().scan(final_partial) {
            if found.category == "prompt" {
                last_attention_match = Some(("prompt", found.matched_text));
            }
        }

        if completion_matched {
            session.mark_exited(None, now);
        }
        match last_attention_match {
            Some(("error", _)) => {
                session.set_attention(AttentionState::ErrorSeen, now);
            }
            Some(("prompt", _)) => {
                session.set_attention(AttentionState::NeedsInput, now);
            }
            _ => {}
        }
        Ok(())
    }

    /// Advance all timers to `now`, firing idle and weak-prompt transitions
    /// whose deadlines have passed. Intended to be called by the reactor on
    /// every timer-expiration suspension point (spec §5).
    pub fn tick(&mut self, now: Instant) {
        let due_idle: Vec<SessionId> = self
            .idle_deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in due_idle {
            if let Some(session) = self.sessions.get_mut(&id) {
                if session.process_state() == ProcessState::Running
                    && session.attention_state() == AttentionState::None
                {
                    session.set_attention(AttentionState::Idle, now);
                }
            }
            self.idle_deadlines.remove(&id);
        }

        let due_weak: Vec<SessionId> = self
            .weak_prompt_deadlines
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in due_weak {
            if let Some((_, _matched)) = self.weak_prompt_deadlines.remove(&id) {
                if let Some(session) = self.sessions.get_mut(&id) {
                    if session.process_state() == ProcessState::Running
                        && session.attention_state() == AttentionState::None
                    {
                        session.set_attention(AttentionState::NeedsInput, now);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn base_patterns() -> IndexMap<String, Vec<String>> {
        let mut patterns = IndexMap::new();
        patterns.insert("error".to_string(), vec![r"error".to_string()]);
        patterns.insert(
            "prompt".to_string(),
            vec![r"\[y/n\]".to_string(), r"do you want.*\?".to_string()],
        );
        patterns.insert("weak_prompt".to_string(), vec![r"\?$".to_string()]);
        patterns
    }

    fn create_params(name: &str) -> CreateSessionParams {
        CreateSessionParams {
            name: name.to_string(),
            cwd: "/tmp".to_string(),
            command: Some("/bin/cat".to_string()),
            args: Vec::new(),
            group: None,
            rows: 24,
            cols: 80,
            base_patterns: base_patterns(),
            profile_patterns: None,
        }
    }

    fn supervisor() -> SessionSupervisor {
        SessionSupervisor::new(SupervisorConfig {
            state_debounce: Duration::from_millis(0),
            ..SupervisorConfig::default()
        })
    }

    #[test]
    fn scenario_c_error_line_sets_error_attention() {
        let mut sup = supervisor();
        let now = Instant::now();
        let id = sup.create(create_params("s1"), now).expect("create");
        let outcome = sup
            .on_pty_chunk(id, Some(b"Error: command not found: pytn\n"), None, now)
            .expect("chunk");
        assert!(outcome.error_seen);
        assert_eq!(outcome.raw_text.as_deref(), Some("Error: command not found: pytn\n"));
        assert_eq!(sup.get(id).unwrap().attention_state(), AttentionState::ErrorSeen);
    }

    #[test]
    fn scenario_d_last_match_wins_prompt_over_error() {
        let mut sup = supervisor();
        let now = Instant::now();
        let id = sup.create(create_params("s1"), now).expect("create");
        let outcome = sup
            .on_pty_chunk(
                id,
                Some(b"Error: something\nRecovered\nContinue? [y/n]\n"),
                None,
                now,
            )
            .expect("chunk");
        assert!(outcome.needs_input);
        assert_eq!(sup.get(id).unwrap().attention_state(), AttentionState::NeedsInput);
    }

    #[test]
    fn scenario_b_split_prompt_across_chunks() {
        let mut sup = supervisor();
        let now = Instant::now();
        let id = sup.create(create_params("s1"), now).expect("create");
        sup.on_pty_chunk(id, Some(b"Do you want to pro"), None, now).expect("chunk1");
        let outcome = sup
            .on_pty_chunk(id, Some(b"ceed?\n"), None, now + Duration::from_millis(1))
            .expect("chunk2");
        assert!(outcome.needs_input);
    }

    #[test]
    fn scenario_a_eof_with_zero_exit_is_done() {
        let mut sup = supervisor();
        let now = Instant::now();
        let id = sup.create(create_params("s1"), now).expect("create");
        sup.on_pty_chunk(id, Some(b"hi\n"), None, now).expect("chunk");
        let outcome = sup
            .on_pty_chunk(id, None, Some(0), now + Duration::from_millis(1))
            .expect("eof");
        assert!(outcome.exited);
        assert_eq!(sup.get(id).unwrap().exit_code(), Some(0));
        assert_eq!(sup.get(id).unwrap().buffer().lines(), vec!["hi"]);
    }

    #[test]
    fn weak_prompt_fires_after_timeout_without_further_output() {
        let mut sup = SessionSupervisor::new(SupervisorConfig {
            state_debounce: Duration::from_millis(0),
            idle_prompt_timeout: Duration::from_millis(100),
            ..SupervisorConfig::default()
        });
        let now = Instant::now();
        let id = sup.create(create_params("s1"), now).expect("create");
        let outcome = sup
            .on_pty_chunk(id, Some(b"What is your name?"), None, now)
            .expect("chunk");
        assert!(outcome.weak_prompt_armed);
        assert_eq!(sup.get(id).unwrap().attention_state(), AttentionState::None);
        sup.tick(now + Duration::from_millis(150));
        assert_eq!(sup.get(id).unwrap().attention_state(), AttentionState::NeedsInput);
    }

    #[test]
    fn weak_prompt_cancelled_by_new_output() {
        let mut sup = SessionSupervisor::new(SupervisorConfig {
            state_debounce: Duration::from_millis(0),
            idle_prompt_timeout: Duration::from_millis(100),
            ..SupervisorConfig::default()
        });
        let now = Instant::now();
        let id = sup.create(create_params("s1"), now).expect("create");
        sup.on_pty_chunk(id, Some(b"What is your name?"), None, now).expect("chunk1");
        sup.on_pty_chunk(id, Some(b"more\n"), None, now + Duration::from_millis(10))
            .expect("chunk2");
        sup.tick(now + Duration::from_millis(150));
        assert_eq!(sup.get(id).unwrap().attention_state(), AttentionState::None);
    }

    #[test]
    fn idle_timer_fires_and_clears_on_new_output() {
        let mut sup = SessionSupervisor::new(SupervisorConfig {
            state_debounce: Duration::from_millis(0),
            idle_threshold: Duration::from_millis(50),
            ..SupervisorConfig::default()
        });
        let now = Instant::now();
        let id = sup.create(create_params("s1"), now).expect("create");
        // First output promotes STARTING -> RUNNING and arms the idle timer.
        sup.on_pty_chunk(id, Some(b"ready\n"), None, now).expect("chunk0");
        assert_eq!(sup.get(id).unwrap().process_state(), ProcessState::Running);
        sup.tick(now + Duration::from_millis(60));
        assert_eq!(sup.get(id).unwrap().attention_state(), AttentionState::Idle);
        sup.on_pty_chunk(id, Some(b"hello\n"), None, now + Duration::from_millis(70))
            .expect("chunk");
        assert_eq!(sup.get(id).unwrap().attention_state(), AttentionState::None);
    }

    #[test]
    fn delete_removes_session_and_timers() {
        let mut sup = supervisor();
        let now = Instant::now();
        let id = sup.create(create_params("s1"), now).expect("create");
        sup.delete(id);
        assert!(sup.get(id).is_none());
        assert!(!sup.idle_deadlines.contains_key(&id));
    }

    #[test]
    fn not_found_errors_propagate() {
        let mut sup = supervisor();
        let bogus = SessionId::new();
        let err = sup.rename(bogus, "x".to_string());
        assert!(matches!(err, Err(SupervisorError::NotFound(_))));
    }

    #[test]
    fn poll_drains_available_output_and_detects_exit() {
        let mut sup = supervisor();
        let now = Instant::now();
        let mut params = create_params("s1");
        params.command = Some("/bin/echo".to_string());
        params.args = vec!["hello".to_string()];
        let id = sup.create(params, now).expect("create");

        let deadline = Instant::now() + Duration::from_millis(500);
        let mut saw_output = false;
        while Instant::now() < deadline {
            let outcome = sup.poll(id, Instant::now()).expect("poll");
            if outcome.complete_lines.iter().any(|line| line.contains("hello")) {
                saw_output = true;
            }
            if outcome.exited {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(saw_output);
    }

    #[test]
    fn small_chunk_flushes_render_immediately() {
        let mut sup = supervisor();
        let now = Instant::now();
        let id = sup.create(create_params("s1"), now).expect("create");
        let outcome = sup.on_pty_chunk(id, Some(b"short\n"), None, now).expect("chunk");
        assert_eq!(outcome.raw_text.as_deref(), Some("short\n"));
    }

    #[test]
    fn large_chunk_without_redraw_control_waits_for_batch_timer() {
        let mut sup = supervisor();
        let now = Instant::now();
        let id = sup.create(create_params("s1"), now).expect("create");
        let big = "x".repeat(BATCH_SIZE_THRESHOLD + 1);
        let outcome = sup.on_pty_chunk(id, Some(big.as_bytes()), None, now).expect("chunk1");
        assert!(outcome.raw_text.is_none());

        let still_early = sup
            .on_pty_chunk(id, Some(b"y"), None, now + Duration::from_millis(5))
            .expect("chunk2");
        assert!(still_early.raw_text.is_none());

        let flushed = sup
            .on_pty_chunk(id, Some(b"z"), None, now + BATCH_FLUSH_INTERVAL)
            .expect("chunk3");
        assert_eq!(flushed.raw_text.as_deref(), Some(format!("{big}yz").as_str()));
    }

    #[test]
    fn redraw_control_sequence_bypasses_batching() {
        let mut sup = supervisor();
        let now = Instant::now();
        let id = sup.create(create_params("s1"), now).expect("create");
        let big = "x".repeat(BATCH_SIZE_THRESHOLD + 1);
        sup.on_pty_chunk(id, Some(big.as_bytes()), None, now).expect("chunk1");
        let outcome = sup
            .on_pty_chunk(id, Some(b"\r"), None, now + Duration::from_millis(1))
            .expect("chunk2");
        assert!(outcome.raw_text.is_some());
    }

    #[test]
    fn eof_flushes_any_remaining_pending_render() {
        let mut sup = supervisor();
        let now = Instant::now();
        let id = sup.create(create_params("s1"), now).expect("create");
        let big = "x".repeat(BATCH_SIZE_THRESHOLD + 1);
        sup.on_pty_chunk(id, Some(big.as_bytes()), None, now).expect("chunk");
        let outcome = sup
            .on_pty_chunk(id, None, Some(0), now + Duration::from_millis(1))
            .expect("eof");
        assert_eq!(outcome.raw_text.as_deref(), Some(big.as_str()));
    }
}
