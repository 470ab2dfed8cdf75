//! Key-event to PTY-byte translation and forwarding policy (spec §4.J).
//!
//! Policy-free: global-shortcut and non-PTY-widget-focus gating are
//! predicates the host supplies, not state this router owns (spec §9's
//! "replace global module state with constructed context passed
//! explicitly").

use serde::{Deserialize, Serialize};

/// A logical key, independent of any specific terminal/TUI crate's key enum.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Key {
    /// A single printable Unicode character.
    Char(char),
    /// Enter/Return.
    Enter,
    /// Tab.
    Tab,
    /// Shift+Tab (back-tab).
    BackTab,
    /// Backspace.
    Backspace,
    /// Delete.
    Delete,
    /// Insert.
    Insert,
    /// Escape.
    Escape,
    /// Arrow up.
    Up,
    /// Arrow down.
    Down,
    /// Arrow left.
    Left,
    /// Arrow right.
    Right,
    /// Home.
    Home,
    /// End.
    End,
    /// Page up.
    PageUp,
    /// Page down.
    PageDown,
}

/// Modifier flags accompanying a [`Key`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    /// Control held.
    pub ctrl: bool,
    /// Alt/Option held.
    pub alt: bool,
    /// Shift held. Only meaningful for keys whose base form doesn't already
    /// encode it (e.g. `BackTab` already implies shift).
    pub shift: bool,
}

/// A single keyboard event: a key plus its modifiers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// The logical key pressed.
    pub key: Key,
    /// Modifiers held alongside it.
    pub modifiers: Modifiers,
}

fn ctrl_byte(ch: char) -> Option<u8> {
    match ch {
        ' ' | '@' => Some(0x00),
        'a'..='z' => Some((ch as u8) - b'a' + 1),
        'A'..='Z' => Some((ch as u8) - b'A' + 1),
        '[' => Some(0x1b),
        '\\' => Some(0x1c),
        ']' => Some(0x1d),
        '^' => Some(0x1e),
        '_' => Some(0x1f),
        _ => None,
    }
}

/// Translate a single [`KeyEvent`] into the byte sequence to write to the
/// active PTY, or `None` if the key carries no PTY-writable meaning (the
/// caller's forwarding-gate predicates should be checked before calling
/// this — see [`should_forward`]).
#[must_use]
pub fn translate(event: KeyEvent) -> Option<Vec<u8>> {
    if event.modifiers.ctrl {
        if let Key::Char(ch) = event.key {
            if let Some(byte) = ctrl_byte(ch) {
                return Some(vec![byte]);
            }
        }
    }
    if event.modifiers.alt {
        if let Key::Char(ch) = event.key {
            let mut bytes = vec![0x1b];
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            return Some(bytes);
        }
    }

    let bytes: &[u8] = match event.key {
        Key::Char(ch) => {
            let mut buf = [0u8; 4];
            return Some(ch.encode_utf8(&mut buf).as_bytes().to_vec());
        }
        Key::Enter => b"\r",
        Key::Tab => b"\t",
        Key::BackTab => b"\x1b[Z",
        Key::Backspace => b"\x7f",
        Key::Delete => b"\x1b[3~",
        Key::Insert => b"\x1b[2~",
        Key::Escape => b"\x1b",
        Key::Up => b"\x1b[A",
        Key::Down => b"\x1b[B",
        Key::Right => b"\x1b[C",
        Key::Left => b"\x1b[D",
        Key::Home => b"\x1b[H",
        Key::End => b"\x1b[F",
        Key::PageUp => b"\x1b[5~",
        Key::PageDown => b"\x1b[6~",
    };
    Some(bytes.to_vec())
}

/// Whether `event` should be forwarded to the PTY at all, given whether it
/// is bound as a global shortcut and whether a non-PTY widget currently has
/// focus. Both predicates are host-supplied per spec §4.J.
#[must_use]
pub fn should_forward(is_global_shortcut: bool, non_pty_widget_focused: bool) -> bool {
    !is_global_shortcut && !non_pty_widget_focused
}

/// Bounded, per-session line buffer accumulating printable keystrokes
/// between commits, mirroring spec §4.J's input-history buffering.
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String,
}

/// Bounded input history with dedup-at-head (spec §9.E).
#[derive(Debug)]
pub struct InputHistory {
    entries: std::collections::VecDeque<String>,
    cap: usize,
}

/// Default input history capacity (spec §3).
pub const DEFAULT_HISTORY_CAP: usize = 500;

impl InputHistory {
    /// Construct an empty history bounded to `cap` entries.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            entries: std::collections::VecDeque::with_capacity(cap.min(64)),
            cap,
        }
    }

    /// Commit `line`. A no-op if it's identical to the most recent entry
    /// (spec §9.E dedup-at-head); otherwise appended, evicting the oldest
    /// entry if over capacity.
    pub fn commit(&mut self, line: String) {
        if self.entries.back() == Some(&line) {
            return;
        }
        self.entries.push_back(line);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// All retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

impl LineEditor {
    /// An empty line editor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a printable character to the line being composed.
    pub fn push(&mut self, ch: char) {
        self.buffer.push(ch);
    }

    /// Remove the last character, if any.
    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    /// Discard the current line (Ctrl+C) without committing it.
    pub fn discard(&mut self) {
        self.buffer.clear();
    }

    /// Take the accumulated line, resetting the editor, for committing to
    /// an [`InputHistory`].
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn plain(key: Key) -> KeyEvent {
        KeyEvent {
            key,
            modifiers: Modifiers::default(),
        }
    }

    #[test]
    fn printable_char_translates_to_utf8_bytes() {
        let bytes = translate(plain(Key::Char('é'))).unwrap();
        assert_eq!(bytes, "é".as_bytes());
    }

    #[test]
    fn named_keys_map_to_fixed_sequences() {
        assert_eq!(translate(plain(Key::Enter)).unwrap(), b"\r");
        assert_eq!(translate(plain(Key::Up)).unwrap(), b"\x1b[A");
        assert_eq!(translate(plain(Key::PageDown)).unwrap(), b"\x1b[6~");
        assert_eq!(translate(plain(Key::BackTab)).unwrap(), b"\x1b[Z");
    }

    #[test]
    fn ctrl_letter_maps_to_control_byte() {
        let event = KeyEvent {
            key: Key::Char('c'),
            modifiers: Modifiers {
                ctrl: true,
                alt: false,
                shift: false,
            },
        };
        assert_eq!(translate(event).unwrap(), vec![3]);
    }

    #[test]
    fn ctrl_space_maps_to_nul() {
        let event = KeyEvent {
            key: Key::Char(' '),
            modifiers: Modifiers {
                ctrl: true,
                alt: false,
                shift: false,
            },
        };
        assert_eq!(translate(event).unwrap(), vec![0]);
    }

    #[test]
    fn ctrl_bracket_family_maps_to_escape_range() {
        for (ch, expected) in [('[', 0x1bu8), ('\\', 0x1c), (']', 0x1d), ('^', 0x1e), ('_', 0x1f)] {
            let event = KeyEvent {
                key: Key::Char(ch),
                modifiers: Modifiers {
                    ctrl: true,
                    alt: false,
                    shift: false,
                },
            };
            assert_eq!(translate(event).unwrap(), vec![expected]);
        }
    }

    #[test]
    fn alt_char_prefixes_escape() {
        let event = KeyEvent {
            key: Key::Char('x'),
            modifiers: Modifiers {
                ctrl: false,
                alt: true,
                shift: false,
            },
        };
        assert_eq!(translate(event).unwrap(), b"\x1bx");
    }

    #[test]
    fn global_shortcut_and_focused_widget_block_forwarding() {
        assert!(!should_forward(true, false));
        assert!(!should_forward(false, true));
        assert!(should_forward(false, false));
    }

    #[test]
    fn history_dedups_at_head_but_not_further_back() {
        let mut history = InputHistory::new(500);
        history.commit("ls".into());
        history.commit("ls".into());
        history.commit("pwd".into());
        history.commit("ls".into());
        assert_eq!(history.entries(), vec!["ls", "pwd", "ls"]);
    }

    #[test]
    fn history_respects_capacity() {
        let mut history = InputHistory::new(2);
        history.commit("a".into());
        history.commit("b".into());
        history.commit("c".into());
        assert_eq!(history.entries(), vec!["b", "c"]);
    }

    #[test]
    fn line_editor_push_backspace_discard_take() {
        let mut editor = LineEditor::new();
        editor.push('h');
        editor.push('i');
        editor.backspace();
        editor.push('!');
        assert_eq!(editor.take(), "h!");
        editor.push('x');
        editor.discard();
        assert_eq!(editor.take(), "");
    }
}
