//! `tmux` multiplexer integration (spec §6): session discovery, attach
//! command construction, pane capture for snapshot scans, and stripping the
//! background SGR attributes tmux's `capture-pane -e` bakes into its output
//! so exported/scanned text isn't tinted by the multiplexer's own theme.

use std::process::Command;

/// List session names under `tmux list-sessions`, optionally restricted to
/// names starting with `prefix`. A tmux server that isn't running at all is
/// not an error here, just an empty list.
#[must_use]
pub fn list_sessions(prefix: &str) -> Vec<String> {
    let output = Command::new("tmux")
        .args(["list-sessions", "-F", "#{session_name}"])
        .output();

    let Ok(output) = output else {
        return Vec::new();
    };
    if !output.status.success() {
        // "no server running on ..." and similar are expected, not failures.
        return Vec::new();
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .filter(|name| prefix.is_empty() || name.starts_with(prefix))
        .collect()
}

/// The argv for attaching to (or creating) `sanitized_name`, prefixed for
/// display/grouping with `prefix`. Caller is responsible for sanitizing the
/// session name before calling this (no shell metacharacters, tmux-safe).
#[must_use]
pub fn session_command(prefix: &str, sanitized_name: &str) -> Vec<String> {
    let name = if prefix.is_empty() {
        sanitized_name.to_string()
    } else {
        format!("{prefix}_{sanitized_name}")
    };
    vec![
        "tmux".to_string(),
        "new-session".to_string(),
        "-A".to_string(),
        "-s".to_string(),
        name,
    ]
}

/// Whether a tmux session named `name` currently exists.
#[must_use]
pub fn has_session(name: &str) -> bool {
    Command::new("tmux")
        .args(["has-session", "-t", name])
        .status()
        .is_ok_and(|status| status.success())
}

/// Capture the current contents of `name`'s active pane, with escape
/// sequences preserved (`-e`). `None` on any failure (no such session, tmux
/// not installed, non-UTF8 output).
#[must_use]
pub fn capture_pane(name: &str) -> Option<String> {
    let output = Command::new("tmux")
        .args(["capture-pane", "-p", "-e", "-t", name])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

/// Strip only the *background*-color SGR parameters tmux's `-e` capture
/// bakes in (49, 40-47, 100-107, `48;5;N`, `48;2;R;G;B`) plus the reverse-
/// video toggles (7, 27), leaving foreground styling intact. Non-SGR escape
/// sequences pass through untouched.
#[must_use]
pub fn strip_background_sgr(ansi: &str) -> String {
    let mut out = String::with_capacity(ansi.len());
    let mut chars = ansi.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\u{1b}' || chars.peek() != Some(&'[') {
            out.push(ch);
            continue;
        }
        chars.next(); // consume '['
        let mut raw = String::new();
        let mut final_byte = None;
        for next in chars.by_ref() {
            if next.is_ascii_alphabetic() || next == '~' {
                final_byte = Some(next);
                break;
            }
            raw.push(next);
        }
        let Some(final_byte) = final_byte else {
            break;
        };
        if final_byte != 'm' {
            out.push('\u{1b}');
            out.push('[');
            out.push_str(&raw);
            out.push(final_byte);
            continue;
        }
        let kept = filter_sgr_params(&raw);
        if !kept.is_empty() {
            out.push('\u{1b}');
            out.push('[');
            out.push_str(&kept.join(";"));
            out.push('m');
        }
    }
    out
}

fn filter_sgr_params(raw: &str) -> Vec<String> {
    let params: Vec<&str> = if raw.is_empty() { vec!["0"] } else { raw.split(';').collect() };
    let mut kept = Vec::new();
    let mut index = 0;
    while index < params.len() {
        let Ok(code) = params[index].parse::<u16>() else {
            index += 1;
            continue;
        };
        if is_background_code(code) {
            index += 1;
            continue;
        }
        if code == 48 {
            // Extended background: `48;5;N` or `48;2;R;G;B`; drop the whole run.
            match params.get(index + 1).and_then(|mode| mode.parse::<u16>().ok()) {
                Some(5) => index += 3,
                Some(2) => index += 5,
                _ => index += 1,
            }
            continue;
        }
        kept.push(params[index].to_string());
        index += 1;
    }
    kept
}

fn is_background_code(code: u16) -> bool {
    code == 49 || (40..=47).contains(&code) || (100..=107).contains(&code) || code == 7 || code == 27
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn session_command_prefixes_name() {
        let argv = session_command("tame", "work");
        assert_eq!(argv, vec!["tmux", "new-session", "-A", "-s", "tame_work"]);
    }

    #[test]
    fn session_command_with_empty_prefix_is_bare_name() {
        let argv = session_command("", "work");
        assert_eq!(argv.last().map(String::as_str), Some("work"));
    }

    #[test]
    fn strip_background_sgr_drops_standard_background() {
        let input = "\x1b[31;41mred-on-red\x1b[0m";
        assert_eq!(strip_background_sgr(input), "\x1b[31mred-on-red\x1b[0m");
    }

    #[test]
    fn strip_background_sgr_drops_256_color_background() {
        let input = "\x1b[38;5;9;48;5;200mtext\x1b[0m";
        assert_eq!(strip_background_sgr(input), "\x1b[38;5;9mtext\x1b[0m");
    }

    #[test]
    fn strip_background_sgr_drops_truecolor_background() {
        let input = "\x1b[48;2;10;20;30;1mtext\x1b[0m";
        assert_eq!(strip_background_sgr(input), "\x1b[1mtext\x1b[0m");
    }

    #[test]
    fn strip_background_sgr_drops_reverse_video() {
        assert_eq!(strip_background_sgr("\x1b[7mtext\x1b[27m"), "text");
    }

    #[test]
    fn strip_background_sgr_preserves_foreground_and_non_sgr_sequences() {
        let input = "\x1b[1;32mok\x1b[0m\x1b[2J";
        assert_eq!(strip_background_sgr(input), "\x1b[1;32mok\x1b[0m\x1b[2J");
    }

    #[test]
    fn strip_background_sgr_drops_now_empty_sgr_entirely() {
        assert_eq!(strip_background_sgr("\x1b[41mtext"), "text");
    }
}
