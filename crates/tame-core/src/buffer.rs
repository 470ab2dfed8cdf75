//! Bounded line-oriented ring buffer with a partial-line tail.
//!
//! Mirrors the behavior of the richest session-manager variant in the
//! source material: complete lines live in a bounded FIFO, the trailing
//! partial (no newline yet) is tracked separately and only concatenated
//! back in on read.

use std::collections::VecDeque;

/// Default capacity used when a session doesn't override
/// `general.max_buffer_lines`.
pub const DEFAULT_MAX_LINES: usize = 10_000;

/// A bounded FIFO of complete lines plus one partial (unterminated) line.
#[derive(Debug)]
pub struct OutputBuffer {
    lines: VecDeque<String>,
    max_lines: usize,
    partial: String,
    /// Monotonic count of complete lines ever appended (spec §4.A).
    pub total_lines_received: u64,
    /// Monotonic count of text bytes ever appended (spec §4.A).
    pub total_bytes_received: u64,
}

impl OutputBuffer {
    /// Create a new buffer bounded to `max_lines` complete lines.
    #[must_use]
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(max_lines.min(1024)),
            max_lines,
            partial: String::new(),
            total_lines_received: 0,
            total_bytes_received: 0,
        }
    }

    /// Configured line cap.
    #[must_use]
    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Append arbitrary decoded text, splitting on `\n` into complete lines
    /// plus a new trailing partial. Oldest complete lines are evicted FIFO
    /// once `max_lines` is exceeded.
    pub fn append(&mut self, text: &str) {
        self.total_bytes_received += text.len() as u64;
        if text.is_empty() {
            return;
        }

        let mut combined = std::mem::take(&mut self.partial);
        combined.push_str(text);

        let mut parts = combined.split('\n').collect::<Vec<_>>();
        // The last element is the new partial (empty if `text` ended in `\n`).
        let new_partial = parts.pop().unwrap_or_default().to_string();

        for line in parts {
            self.lines.push_back(line.to_string());
            self.total_lines_received += 1;
            while self.lines.len() > self.max_lines {
                self.lines.pop_front();
            }
        }

        self.partial = new_partial;
    }

    /// Ordered complete lines currently retained (oldest first).
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// The current unterminated tail, if any.
    #[must_use]
    pub fn partial(&self) -> &str {
        &self.partial
    }

    /// Complete lines joined with `\n`, followed by the partial tail (no
    /// extra trailing newline is introduced).
    #[must_use]
    pub fn all_text(&self) -> String {
        if self.lines.is_empty() {
            return self.partial.clone();
        }
        let mut text = self
            .lines
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        if !self.partial.is_empty() {
            text.push('\n');
            text.push_str(&self.partial);
        }
        text
    }

    /// Drop all retained lines, the partial, and reset counters.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.partial.clear();
        self.total_lines_received = 0;
        self.total_bytes_received = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn append_splits_complete_lines_and_retains_partial() {
        let mut buf = OutputBuffer::new(10);
        buf.append("hello\nworld\npartial");
        assert_eq!(buf.lines(), vec!["hello", "world"]);
        assert_eq!(buf.partial(), "partial");
        assert_eq!(buf.all_text(), "hello\nworld\npartial");
    }

    #[test]
    fn partial_is_prefixed_on_next_append() {
        let mut buf = OutputBuffer::new(10);
        buf.append("Do you want to pro");
        buf.append("ceed?\n");
        assert_eq!(buf.lines(), vec!["Do you want to proceed?"]);
        assert_eq!(buf.partial(), "");
    }

    #[test]
    fn eviction_is_fifo_and_bounded() {
        let mut buf = OutputBuffer::new(3);
        for i in 0..10 {
            buf.append(&format!("line{i}\n"));
        }
        assert_eq!(buf.lines().len(), 3);
        assert_eq!(buf.lines(), vec!["line7", "line8", "line9"]);
        assert_eq!(buf.total_lines_received, 10);
    }

    #[test]
    fn all_text_has_no_trailing_newline_without_partial() {
        let mut buf = OutputBuffer::new(10);
        buf.append("a\nb\n");
        assert_eq!(buf.all_text(), "a\nb");
    }

    #[test]
    fn counters_are_monotonic() {
        let mut buf = OutputBuffer::new(2);
        buf.append("a\nb\nc\n");
        assert_eq!(buf.total_lines_received, 3);
        let bytes_before = buf.total_bytes_received;
        buf.append("d\n");
        assert!(buf.total_bytes_received > bytes_before);
    }

    #[test]
    fn clear_resets_everything() {
        let mut buf = OutputBuffer::new(10);
        buf.append("a\nb\npartial");
        buf.clear();
        assert!(buf.lines().is_empty());
        assert_eq!(buf.partial(), "");
        assert_eq!(buf.total_lines_received, 0);
        assert_eq!(buf.total_bytes_received, 0);
    }

    /// Property 1 (spec §8): for any input, `lines().len() <= N`, `lines()`
    /// equals the last N complete lines, and `all_text()` matches the
    /// join-then-append-partial rule.
    #[test]
    fn property_bounded_and_matches_tail_of_full_split() {
        let input = "l0\nl1\nl2\nl3\nl4\nl5\nl6\ntail-no-newline";
        let cap = 4;
        let mut buf = OutputBuffer::new(cap);
        buf.append(input);

        let all_parts: Vec<&str> = input.split('\n').collect();
        let expected_partial = *all_parts.last().unwrap_or(&"");
        let complete: Vec<&str> = all_parts[..all_parts.len() - 1].to_vec();
        let expected_tail: Vec<&str> = complete[complete.len().saturating_sub(cap)..].to_vec();

        assert!(buf.lines().len() <= cap);
        assert_eq!(buf.lines(), expected_tail);
        assert_eq!(buf.partial(), expected_partial);
    }
}
