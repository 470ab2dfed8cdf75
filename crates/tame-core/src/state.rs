//! Dual-axis (Process × Attention) session state machine (spec §4.D, §3).

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Lifecycle state of the underlying child process.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Spawned but no output observed yet.
    Starting,
    /// Actively running.
    Running,
    /// Stopped via `SIGSTOP`.
    Paused,
    /// Process has exited; terminal state.
    Exited,
}

/// Whether (and why) a session needs the user's attention.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionState {
    /// Nothing outstanding.
    None,
    /// A prompt pattern matched; the session is waiting on input.
    NeedsInput,
    /// An error pattern matched.
    ErrorSeen,
    /// No activity for the idle threshold.
    Idle,
}

/// Pure function of `(ProcessState, AttentionState)` used to render status.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    /// Mirrors `ProcessState::Starting`.
    Starting,
    /// Mirrors `ProcessState::Paused`.
    Paused,
    /// Exited, no error seen.
    Done,
    /// Exited with an error seen, or exited non-zero.
    Error,
    /// Running, attention needed on a prompt.
    Waiting,
    /// Running, an error pattern matched but the process is still alive.
    RunningError,
    /// Running, idle timeout elapsed.
    Idle,
    /// Running, nothing outstanding.
    Active,
}

/// Derive the display state, per spec §3's truth table.
#[must_use]
pub fn derive_display_state(process: ProcessState, attention: AttentionState) -> DisplayState {
    match process {
        ProcessState::Starting => DisplayState::Starting,
        ProcessState::Paused => DisplayState::Paused,
        ProcessState::Exited => {
            if attention == AttentionState::ErrorSeen {
                DisplayState::Error
            } else {
                DisplayState::Done
            }
        }
        ProcessState::Running => match attention {
            AttentionState::NeedsInput => DisplayState::Waiting,
            AttentionState::ErrorSeen => DisplayState::RunningError,
            AttentionState::Idle => DisplayState::Idle,
            AttentionState::None => DisplayState::Active,
        },
    }
}

fn valid_process_transition(current: ProcessState, target: ProcessState) -> bool {
    use ProcessState::{Exited, Paused, Running, Starting};
    matches!(
        (current, target),
        (Starting, Running)
            | (Starting, Exited)
            | (Running, Paused)
            | (Running, Exited)
            | (Paused, Running)
            | (Paused, Exited)
    )
}

fn valid_attention_transition(current: AttentionState, target: AttentionState) -> bool {
    use AttentionState::{ErrorSeen, Idle, NeedsInput, None as AttnNone};
    matches!(
        (current, target),
        (AttnNone, NeedsInput)
            | (AttnNone, ErrorSeen)
            | (AttnNone, Idle)
            | (NeedsInput, AttnNone)
            | (NeedsInput, ErrorSeen)
            | (ErrorSeen, AttnNone)
            | (ErrorSeen, NeedsInput)
            | (Idle, AttnNone)
            | (Idle, NeedsInput)
            | (Idle, ErrorSeen)
    )
}

fn is_priority_process(target: ProcessState) -> bool {
    target == ProcessState::Exited
}

fn is_priority_attention(target: AttentionState) -> bool {
    matches!(target, AttentionState::ErrorSeen | AttentionState::NeedsInput)
}

/// Default debounce window (spec §4.D).
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Validated dual-axis state machine with debounce.
///
/// Holds no reference to its owning session; [`crate::session::SessionCore`]
/// drives it and reacts to the `bool` each setter returns (whether the
/// transition actually applied).
#[derive(Debug)]
pub struct StateModel {
    process: ProcessState,
    attention: AttentionState,
    debounce: Duration,
    last_transition_at: Option<Instant>,
}

impl StateModel {
    /// Construct a model starting in `Starting`/`None` with the given
    /// debounce window.
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            process: ProcessState::Starting,
            attention: AttentionState::None,
            debounce,
            last_transition_at: None,
        }
    }

    /// Current process state.
    #[must_use]
    pub fn process(&self) -> ProcessState {
        self.process
    }

    /// Current attention state.
    #[must_use]
    pub fn attention(&self) -> AttentionState {
        self.attention
    }

    /// Derived display state for the current axes.
    #[must_use]
    pub fn display(&self) -> DisplayState {
        derive_display_state(self.process, self.attention)
    }

    fn debounced(&self, now: Instant) -> bool {
        match self.last_transition_at {
            Some(last) => now.duration_since(last) < self.debounce,
            None => false,
        }
    }

    /// Attempt a process-state transition at `now`. Returns `true` if it
    /// applied. EXITED is terminal: self-edges and any transition attempted
    /// from EXITED are rejected.
    pub fn set_process(&mut self, target: ProcessState, now: Instant) -> bool {
        if target == self.process {
            return false;
        }
        if !valid_process_transition(self.process, target) {
            tracing::warn!(?self.process, ?target, "rejected invalid process transition");
            return false;
        }
        if !is_priority_process(target) && self.debounced(now) {
            return false;
        }
        self.process = target;
        self.last_transition_at = Some(now);
        true
    }

    /// Attempt an attention-state transition at `now`. Returns `true` if it
    /// applied.
    pub fn set_attention(&mut self, target: AttentionState, now: Instant) -> bool {
        if target == self.attention {
            return false;
        }
        if !valid_attention_transition(self.attention, target) {
            tracing::warn!(?self.attention, ?target, "rejected invalid attention transition");
            return false;
        }
        if !is_priority_attention(target) && self.debounced(now) {
            return false;
        }
        self.attention = target;
        self.last_transition_at = Some(now);
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn derived_state_purity_matches_truth_table() {
        use AttentionState::{ErrorSeen, Idle, NeedsInput, None as AttnNone};
        use DisplayState::{Active, Done, Error, Idle as DIdle, Paused, RunningError, Starting, Waiting};
        use ProcessState::{Exited, Paused as PPaused, Running, Starting as PStarting};

        assert_eq!(derive_display_state(PStarting, AttnNone), Starting);
        assert_eq!(derive_display_state(PPaused, AttnNone), Paused);
        assert_eq!(derive_display_state(Exited, AttnNone), Done);
        assert_eq!(derive_display_state(Exited, ErrorSeen), Error);
        assert_eq!(derive_display_state(Running, NeedsInput), Waiting);
        assert_eq!(derive_display_state(Running, ErrorSeen), RunningError);
        assert_eq!(derive_display_state(Running, Idle), DIdle);
        assert_eq!(derive_display_state(Running, AttnNone), Active);
    }

    #[test]
    fn exited_is_terminal_and_self_edges_rejected() {
        let mut model = StateModel::new(Duration::from_millis(0));
        let t0 = Instant::now();
        assert!(model.set_process(ProcessState::Running, t0));
        assert!(model.set_process(ProcessState::Exited, t0));
        assert!(!model.set_process(ProcessState::Running, t0));
        assert!(!model.set_process(ProcessState::Exited, t0));
    }

    #[test]
    fn debounce_suppresses_non_priority_then_allows_priority() {
        let mut model = StateModel::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(model.set_attention(AttentionState::Idle, t0));
        // within debounce window: non-priority transition suppressed
        let t1 = t0 + Duration::from_millis(100);
        assert!(model.set_attention(AttentionState::NeedsInput, t1));
        // NeedsInput is priority so it should NOT be suppressed
        assert_eq!(model.attention(), AttentionState::NeedsInput);
    }

    #[test]
    fn debounce_suppresses_then_releases_after_window() {
        let mut model = StateModel::new(Duration::from_millis(500));
        let t0 = Instant::now();
        model.set_process(ProcessState::Running, t0);
        assert!(model.set_attention(AttentionState::Idle, t0));
        let within = t0 + Duration::from_millis(200);
        // Idle -> None is non-priority, suppressed within window
        assert!(!model.set_attention(AttentionState::None, within));
        assert_eq!(model.attention(), AttentionState::Idle);
        let after = t0 + Duration::from_millis(600);
        assert!(model.set_attention(AttentionState::None, after));
    }

    #[test]
    fn invalid_attention_transition_is_rejected() {
        let mut model = StateModel::new(Duration::from_millis(0));
        let t0 = Instant::now();
        assert!(model.set_attention(AttentionState::NeedsInput, t0));
        // NeedsInput -> Idle is not in the valid transition table.
        assert!(!model.set_attention(AttentionState::Idle, t0 + Duration::from_secs(1)));
        assert_eq!(model.attention(), AttentionState::NeedsInput);
    }
}
