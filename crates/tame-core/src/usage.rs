//! Usage/quota field extraction from raw output text (spec §3.E).
//!
//! Mirrors `tame/session/manager.py::_USAGE_PATTERNS` field-by-field: each
//! field is independently optional and is updated in place the moment its
//! pattern matches a complete line. Fields never revert to `None` once
//! populated; a later non-matching line simply leaves the prior value.
//! These patterns are built-in and not user-configurable (spec Open
//! Question 3).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Parsed usage/quota state for a single session, updated incrementally.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    /// Number of messages used this window, if ever observed.
    pub messages_used: Option<u64>,
    /// Message quota total for the window, if ever observed.
    pub messages_total: Option<u64>,
    /// Number of tokens used this window, if ever observed.
    pub tokens_used: Option<u64>,
    /// Model name, if ever observed.
    pub model_name: Option<String>,
    /// Human-readable refresh time clause, if ever observed.
    pub refresh_time: Option<String>,
    /// Free-form remaining-quota description. The original always
    /// collapses this to `"{total} of {total}"` regardless of
    /// `messages_used` — preserved verbatim since it's an externally
    /// observable quirk, not a bug to fix.
    pub quota_remaining: Option<String>,
    /// The raw matched text for the messages-used pattern, if ever observed.
    pub raw_text: Option<String>,
}

static MESSAGES_USED: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)(\w+)\s+messages?:\s*(\d+)/(\d+)\s*remaining").unwrap()
});
static TOKENS_USED: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)tokens?\s*(?:used)?:\s*([\d,]+)").unwrap()
});
static MODEL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)(?:using\s+)?model:\s*(\S+)").unwrap()
});
static REFRESH_TIME: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)(?:resets?\s+in|refresh(?:es)?(?:\s+(?:at|in))?)\s*:?\s*(.+)").unwrap()
});

impl UsageInfo {
    /// Scan a single complete `line` and update whichever fields match. A
    /// line may update more than one field; non-matching lines are no-ops.
    pub fn update_from_line(&mut self, line: &str) {
        if let Some(caps) = MESSAGES_USED.captures(line) {
            // Regex requires all three groups, so these are always present.
            if let (Some(model), Some(used), Some(total)) =
                (caps.get(1), caps.get(2), caps.get(3))
            {
                self.model_name = Some(model.as_str().to_string());
                if let Ok(used) = used.as_str().parse() {
                    self.messages_used = Some(used);
                }
                if let Ok(total) = total.as_str().parse::<u64>() {
                    self.messages_total = Some(total);
                    self.quota_remaining = Some(format!("{total} of {total}"));
                }
                self.raw_text = Some(caps.get(0).map_or("", |m| m.as_str()).to_string());
            }
        }
        if let Some(caps) = TOKENS_USED.captures(line) {
            if let Some(digits) = caps.get(1) {
                let cleaned = digits.as_str().replace(',', "");
                if let Ok(value) = cleaned.parse() {
                    self.tokens_used = Some(value);
                }
            }
        }
        if let Some(caps) = MODEL_NAME.captures(line) {
            if let Some(name) = caps.get(1) {
                self.model_name = Some(name.as_str().to_string());
            }
        }
        if let Some(caps) = REFRESH_TIME.captures(line) {
            if let Some(when) = caps.get(1) {
                self.refresh_time = Some(when.as_str().trim().to_string());
            }
        }
    }
}
