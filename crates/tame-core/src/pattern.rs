//! Compiled categorized regex set with fixed priority scan (spec §4.B).

use indexmap::IndexMap;
use regex::Regex;

use crate::error::PatternCompileError;

/// Fixed scan priority for well-known categories; any other category
/// (`weak_prompt`, user-defined profile categories) is scanned afterwards,
/// in the order it appears in the source map.
const SCAN_ORDER: &[&str] = &["error", "prompt", "completion", "progress"];

/// Result of a successful [`PatternMatcher::scan`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternMatch {
    /// Category the winning pattern belongs to.
    pub category: String,
    /// Declaration-order index of the winning pattern within its category.
    pub pattern_index: usize,
    /// The substring the pattern matched.
    pub matched_text: String,
    /// The full line that was scanned.
    pub line: String,
}

/// An immutable, thread-safe, side-effect-free compiled pattern set.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    compiled: IndexMap<String, Vec<Regex>>,
}

impl PatternMatcher {
    /// Compile `patterns` (category → ordered regex sources) case-insensitively.
    /// Categories are scanned later in the order they appear in `patterns`,
    /// so callers that care about non-built-in scan order (spec §4.B) must
    /// supply an already-ordered map.
    ///
    /// # Errors
    /// Returns the first regex that fails to compile; per spec §7 no partial
    /// matcher is ever installed.
    pub fn new(
        patterns: &IndexMap<String, Vec<String>>,
    ) -> Result<Self, PatternCompileError> {
        let mut compiled = IndexMap::new();
        for (category, sources) in patterns {
            let mut regexes = Vec::with_capacity(sources.len());
            for (index, source) in sources.iter().enumerate() {
                let pattern = format!("(?i){source}");
                let regex =
                    Regex::new(&pattern).map_err(|source| PatternCompileError {
                        category: category.clone(),
                        index,
                        source,
                    })?;
                regexes.push(regex);
            }
            compiled.insert(category.clone(), regexes);
        }
        Ok(Self { compiled })
    }

    /// Scan a single line, returning the first match in fixed priority order
    /// (`error` > `prompt` > `completion` > `progress`, then any other
    /// category by map order), first match within a category by
    /// declaration order.
    #[must_use]
    pub fn scan(&self, line: &str) -> Option<PatternMatch> {
        for category in SCAN_ORDER {
            if let Some(found) = self.scan_category(category, line) {
                return Some(found);
            }
        }
        for category in self.compiled.keys() {
            if SCAN_ORDER.contains(&category.as_str()) {
                continue;
            }
            if let Some(found) = self.scan_category(category, line) {
                return Some(found);
            }
        }
        None
    }

    fn scan_category(&self, category: &str, line: &str) -> Option<PatternMatch> {
        let regexes = self.compiled.get(category)?;
        for (index, regex) in regexes.iter().enumerate() {
            if let Some(m) = regex.find(line) {
                return Some(PatternMatch {
                    category: category.to_string(),
                    pattern_index: index,
                    matched_text: m.as_str().to_string(),
                    line: line.to_string(),
                });
            }
        }
        None
    }
}
