//! Active-screen rendering state machine (spec §4.I).
//!
//! Holds the per-session terminal-emulator cache and all of the
//! bookkeeping a renderer needs (refresh coalescing, scroll position,
//! snapshot override, size-capped mirror fallback) without doing any
//! actual drawing — that lives in the CLI's ratatui glue.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::ids::SessionId;
use crate::terminal::{ScreenController, StyleRun};

/// Default refresh coalescing window (spec §4.I: "at most one refresh is
/// emitted per 1/60 s window"), matching the batching window used for PTY
/// chunk delivery (spec §5).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(16);

/// Cap on retained characters in the size-capped text-mirror fallback.
pub const DEFAULT_MIRROR_CAP: usize = 64 * 1024;

/// What a caller should draw for the currently active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewportContent {
    /// No session selected: render the branded welcome layout.
    Welcome,
    /// A literal ANSI snapshot, shown verbatim until live output arrives.
    Snapshot(String),
    /// Live emulator grid: row-major style runs, plus the cursor position
    /// if it should be drawn (focused and not hidden).
    Live {
        /// Run-length-encoded rows, oldest-to-newest top-to-bottom.
        rows: Vec<Vec<StyleRun>>,
        /// `(row, col)` to draw in reverse video, if visible.
        cursor: Option<(usize, usize)>,
    },
    /// Scrolled into history: plain text lines supplied by the caller.
    Scrollback(Vec<String>),
    /// Fallback text mirror (emulator unavailable for this session).
    Mirror(String),
}

struct SessionView {
    emulator: Option<ScreenController>,
    mirror: String,
    snapshot: Option<String>,
    scroll_offset: usize,
}

/// Detect a full-screen-clear control sequence (`ESC [2J`, `ESC [3J`, or
/// `ESC c`) and return the byte offset immediately after the last one
/// found, so the caller can discard everything before it.
#[must_use]
fn last_full_screen_clear_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut last = None;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0x1b {
            if bytes.get(i + 1) == Some(&b'c') {
                last = Some(i + 2);
                i += 2;
                continue;
            }
            if bytes.get(i + 1) == Some(&b'[') {
                let mut j = i + 2;
                while j < bytes.len() && !bytes[j].is_ascii_alphabetic() {
                    j += 1;
                }
                if j < bytes.len() && bytes[j] == b'J' {
                    let params = &text[i + 2..j];
                    if params == "2" || params == "3" {
                        last = Some(j + 1);
                    }
                }
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
    last
}

/// Owns one [`ScreenController`] per registered session and the viewport
/// bookkeeping (active selection, scroll, refresh coalescing) for
/// rendering exactly one of them at a time.
pub struct Viewport {
    sessions: HashMap<SessionId, SessionView>,
    active: Option<SessionId>,
    focused: bool,
    dirty: bool,
    last_refresh: Option<Instant>,
    refresh_interval: Duration,
}

impl Viewport {
    /// Construct an empty viewport with no active session.
    #[must_use]
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            active: None,
            focused: true,
            dirty: false,
            last_refresh: None,
            refresh_interval,
        }
    }

    /// Register a session's emulator cache entry, sized `rows`×`cols`.
    /// `emulator_available` selects live-grid rendering vs. the text-mirror
    /// fallback for this session.
    pub fn register_session(&mut self, id: SessionId, rows: u16, cols: u16, emulator_available: bool) {
        self.sessions.insert(
            id,
            SessionView {
                emulator: emulator_available.then(|| ScreenController::new(rows as usize, cols as usize)),
                mirror: String::new(),
                snapshot: None,
                scroll_offset: 0,
            },
        );
    }

    /// Drop a session's cache entry; deselects it if it was active.
    pub fn remove_session(&mut self, id: SessionId) {
        self.sessions.remove(&id);
        if self.active == Some(id) {
            self.active = None;
        }
    }

    /// Select the active session, or `None` for the welcome state.
    pub fn set_active(&mut self, id: Option<SessionId>) {
        self.active = id;
        self.dirty = true;
    }

    /// Currently active session, if any.
    #[must_use]
    pub fn active(&self) -> Option<SessionId> {
        self.active
    }

    /// Feed newly observed output into `id`'s emulator or mirror. Clears
    /// any snapshot override. If `id` is active and auto-scrolling, resets
    /// scroll offset to 0. Always marks the viewport dirty.
    pub fn append_output(&mut self, id: SessionId, text: &str) {
        let Some(view) = self.sessions.get_mut(&id) else {
            return;
        };
        view.snapshot = None;
        if let Some(emulator) = view.emulator.as_mut() {
            emulator.feed(text.as_bytes());
        } else {
            if let Some(clear_end) = last_full_screen_clear_end(text) {
                view.mirror.clear();
                view.mirror.push_str(&text[clear_end..]);
            } else {
                view.mirror.push_str(text);
            }
            if view.mirror.len() > DEFAULT_MIRROR_CAP {
                let excess = view.mirror.len() - DEFAULT_MIRROR_CAP;
                let cut = view.mirror
                    .char_indices()
                    .map(|(i, _)| i)
                    .find(|i| *i >= excess)
                    .unwrap_or(view.mirror.len());
                view.mirror.drain(..cut);
            }
        }
        self.dirty = true;
    }

    /// Bypass the emulator and display a literal ANSI snapshot (spec §4.I:
    /// used on activation when an external pane capture is available).
    pub fn show_snapshot(&mut self, id: SessionId, text: String) {
        if let Some(view) = self.sessions.get_mut(&id) {
            view.snapshot = Some(text);
            self.dirty = true;
        }
    }

    /// Whether `id` is currently auto-scrolling (offset == 0).
    #[must_use]
    pub fn auto_scroll(&self, id: SessionId) -> bool {
        self.sessions.get(&id).map_or(true, |view| view.scroll_offset == 0)
    }

    /// Scroll up (into history) by `lines`, capped at `history_depth`.
    pub fn scroll_up(&mut self, id: SessionId, lines: usize, history_depth: usize) {
        if let Some(view) = self.sessions.get_mut(&id) {
            view.scroll_offset = (view.scroll_offset + lines).min(history_depth);
            self.dirty = true;
        }
    }

    /// Scroll down (toward live) by `lines`, floored at 0.
    pub fn scroll_down(&mut self, id: SessionId, lines: usize) {
        if let Some(view) = self.sessions.get_mut(&id) {
            view.scroll_offset = view.scroll_offset.saturating_sub(lines);
            self.dirty = true;
        }
    }

    /// Current scroll offset for `id`.
    #[must_use]
    pub fn scroll_offset(&self, id: SessionId) -> usize {
        self.sessions.get(&id).map_or(0, |view| view.scroll_offset)
    }

    /// Resize `id`'s emulator cache entry and request a refresh. Returns
    /// the `(rows, cols)` notification for the caller to forward to the
    /// session's `PtyChild::resize` (spec §4.I: consumed by the
    /// supervisor, not applied here).
    pub fn resize(&mut self, id: SessionId, rows: u16, cols: u16) -> (u16, u16) {
        if let Some(view) = self.sessions.get_mut(&id) {
            if let Some(emulator) = view.emulator.as_mut() {
                emulator.resize(rows as usize, cols as usize);
            }
        }
        self.dirty = true;
        (rows, cols)
    }

    /// Mark the viewport dirty without supplying new content (e.g. a
    /// blink-cursor tick).
    pub fn request_refresh(&mut self) {
        self.dirty = true;
    }

    /// Pause refresh coalescing on focus loss, per spec §4.I.
    pub fn on_focus_lost(&mut self) {
        self.focused = false;
    }

    /// Resume on focus regain; the next [`Self::should_refresh`] call
    /// flushes any pending dirty state immediately, ignoring the interval.
    pub fn on_focus_gained(&mut self) {
        self.focused = true;
        self.last_refresh = None;
    }

    /// Whether a refresh should be emitted at `now`: dirty, focused, and
    /// the coalescing window has elapsed (or never ran).
    #[must_use]
    pub fn should_refresh(&self, now: Instant) -> bool {
        if !self.dirty || !self.focused {
            return false;
        }
        match self.last_refresh {
            None => true,
            Some(last) => now.duration_since(last) >= self.refresh_interval,
        }
    }

    /// Record that a refresh was just emitted at `now`, clearing the dirty
    /// flag.
    pub fn mark_refreshed(&mut self, now: Instant) {
        self.dirty = false;
        self.last_refresh = Some(now);
    }

    /// Build the content a renderer should draw for the active session.
    /// `scrollback` supplies plain-text history lines when scrolled away
    /// from the live tail (the viewport itself retains no history; that's
    /// the session's `OutputBuffer`).
    #[must_use]
    pub fn content(&self, focused: bool, scrollback: impl FnOnce(SessionId, usize) -> Vec<String>) -> ViewportContent {
        let Some(id) = self.active else {
            return ViewportContent::Welcome;
        };
        let Some(view) = self.sessions.get(&id) else {
            return ViewportContent::Welcome;
        };
        if let Some(snapshot) = &view.snapshot {
            return ViewportContent::Snapshot(snapshot.clone());
        }
        if view.scroll_offset > 0 {
            return ViewportContent::Scrollback(scrollback(id, view.scroll_offset));
        }
        match &view.emulator {
            Some(emulator) => {
                let screen = emulator.active_screen();
                let screen_ref = screen.borrow();
                let (rows, _cols) = screen_ref.dimensions();
                let row_runs = (0..rows).map(|r| screen_ref.row_runs(r)).collect();
                let cursor = (focused && screen_ref.cursor_visible()).then_some(screen_ref.cursor());
                ViewportContent::Live { rows: row_runs, cursor }
            }
            None => ViewportContent::Mirror(view.mirror.clone()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn no_active_session_is_welcome() {
        let viewport = Viewport::new(DEFAULT_REFRESH_INTERVAL);
        assert_eq!(viewport.content(true, |_, _| Vec::new()), ViewportContent::Welcome);
    }

    #[test]
    fn live_content_reflects_emulator_grid() {
        let mut viewport = Viewport::new(DEFAULT_REFRESH_INTERVAL);
        let id = SessionId::new();
        viewport.register_session(id, 2, 10, true);
        viewport.set_active(Some(id));
        viewport.append_output(id, "hi");
        let content = viewport.content(true, |_, _| Vec::new());
        match content {
            ViewportContent::Live { rows, .. } => {
                let text: String = rows[0].iter().map(|run| run.text.clone()).collect();
                assert!(text.starts_with("hi"));
            }
            other => panic!("expected Live, got {other:?}"),
        }
    }

    #[test]
    fn snapshot_overrides_until_next_output() {
        let mut viewport = Viewport::new(DEFAULT_REFRESH_INTERVAL);
        let id = SessionId::new();
        viewport.register_session(id, 2, 10, true);
        viewport.set_active(Some(id));
        viewport.show_snapshot(id, "captured pane".to_string());
        assert_eq!(
            viewport.content(true, |_, _| Vec::new()),
            ViewportContent::Snapshot("captured pane".to_string())
        );
        viewport.append_output(id, "live\n");
        match viewport.content(true, |_, _| Vec::new()) {
            ViewportContent::Live { .. } => {}
            other => panic!("expected Live after append, got {other:?}"),
        }
    }

    #[test]
    fn scrolled_away_from_tail_uses_scrollback_slice() {
        let mut viewport = Viewport::new(DEFAULT_REFRESH_INTERVAL);
        let id = SessionId::new();
        viewport.register_session(id, 2, 10, true);
        viewport.set_active(Some(id));
        viewport.scroll_up(id, 5, 100);
        assert!(!viewport.auto_scroll(id));
        let content = viewport.content(true, |_, offset| vec![format!("line-{offset}")]);
        assert_eq!(content, ViewportContent::Scrollback(vec!["line-5".to_string()]));
        viewport.scroll_down(id, 5);
        assert!(viewport.auto_scroll(id));
    }

    #[test]
    fn scroll_up_is_capped_at_history_depth() {
        let mut viewport = Viewport::new(DEFAULT_REFRESH_INTERVAL);
        let id = SessionId::new();
        viewport.register_session(id, 2, 10, true);
        viewport.scroll_up(id, 1000, 20);
        assert_eq!(viewport.scroll_offset(id), 20);
    }

    #[test]
    fn mirror_fallback_used_when_emulator_unavailable() {
        let mut viewport = Viewport::new(DEFAULT_REFRESH_INTERVAL);
        let id = SessionId::new();
        viewport.register_session(id, 2, 10, false);
        viewport.set_active(Some(id));
        viewport.append_output(id, "plain output\n");
        assert_eq!(
            viewport.content(true, |_, _| Vec::new()),
            ViewportContent::Mirror("plain output\n".to_string())
        );
    }

    #[test]
    fn mirror_discards_content_before_full_screen_clear() {
        let mut viewport = Viewport::new(DEFAULT_REFRESH_INTERVAL);
        let id = SessionId::new();
        viewport.register_session(id, 2, 10, false);
        viewport.set_active(Some(id));
        viewport.append_output(id, "stale\x1b[2Jfresh");
        assert_eq!(
            viewport.content(true, |_, _| Vec::new()),
            ViewportContent::Mirror("fresh".to_string())
        );
    }

    #[test]
    fn refresh_coalesces_within_window_then_flushes() {
        let mut viewport = Viewport::new(Duration::from_millis(16));
        let t0 = Instant::now();
        viewport.request_refresh();
        assert!(viewport.should_refresh(t0));
        viewport.mark_refreshed(t0);
        viewport.request_refresh();
        assert!(!viewport.should_refresh(t0 + Duration::from_millis(5)));
        assert!(viewport.should_refresh(t0 + Duration::from_millis(20)));
    }

    #[test]
    fn focus_loss_pauses_refresh_and_regain_flushes_pending() {
        let mut viewport = Viewport::new(Duration::from_millis(16));
        let t0 = Instant::now();
        viewport.request_refresh();
        viewport.on_focus_lost();
        assert!(!viewport.should_refresh(t0 + Duration::from_millis(50)));
        viewport.on_focus_gained();
        assert!(viewport.should_refresh(t0 + Duration::from_millis(50)));
    }
}
