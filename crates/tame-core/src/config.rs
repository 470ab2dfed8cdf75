//! TOML configuration loading and deep-merge over compiled defaults
//! (spec §6).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::notify::EventType;

/// `general.*`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Path to the log file; empty disables file logging.
    pub log_file: String,
    /// `ERROR`/`WARN`/`INFO`/`DEBUG`.
    pub log_level: String,
    /// Per-session `OutputBuffer` cap.
    pub max_buffer_lines: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_file: String::new(),
            log_level: "INFO".to_string(),
            max_buffer_lines: crate::buffer::DEFAULT_MAX_LINES,
        }
    }
}

/// `sessions.*`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Empty means the user's home directory.
    pub default_working_directory: String,
    /// Empty means `$SHELL` or `/bin/bash`.
    pub default_shell: String,
    /// Idle threshold, in seconds.
    pub idle_threshold_seconds: f64,
    /// Resource sampling interval, in seconds.
    pub resource_poll_seconds: f64,
    /// Wrap each child in an external terminal multiplexer.
    pub start_in_tmux: bool,
    /// Re-attach to multiplexer sessions found on startup.
    pub restore_tmux_sessions_on_startup: bool,
    /// Prefix used when naming/filtering multiplexer sessions.
    pub tmux_session_prefix: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            default_working_directory: String::new(),
            default_shell: String::new(),
            idle_threshold_seconds: crate::supervisor::DEFAULT_IDLE_THRESHOLD.as_secs_f64(),
            resource_poll_seconds: 5.0,
            start_in_tmux: false,
            restore_tmux_sessions_on_startup: false,
            tmux_session_prefix: "tame".to_string(),
        }
    }
}

/// One category's regex sources under `patterns.<category>`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternCategoryConfig {
    /// `patterns.<category>.regexes`.
    pub regexes: Vec<String>,
    /// `patterns.<category>.shell_regexes`.
    pub shell_regexes: Vec<String>,
    /// `patterns.prompt.weak_regexes` (only meaningful for `prompt`).
    pub weak_regexes: Vec<String>,
}

/// `patterns.*`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    /// Per-category regex sources, keyed by category name.
    #[serde(flatten)]
    pub categories: BTreeMap<String, PatternCategoryConfig>,
    /// Seconds between a weak-prompt match and it becoming `NEEDS_INPUT`.
    pub idle_prompt_timeout: f64,
    /// Milliseconds the state model debounces non-priority transitions.
    pub state_debounce_ms: u64,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            categories: BTreeMap::new(),
            idle_prompt_timeout: crate::supervisor::DEFAULT_IDLE_PROMPT_TIMEOUT.as_secs_f64(),
            state_debounce_ms: crate::state::DEFAULT_DEBOUNCE.as_millis() as u64,
        }
    }
}

impl PatternsConfig {
    /// Flatten `regexes` + `shell_regexes` (+ `weak_regexes`, stored under a
    /// synthetic `weak_prompt` category) into the
    /// category→ordered-regex-sources map [`crate::pattern::PatternMatcher`]
    /// expects. `categories` is keyed by a `BTreeMap` (TOML tables don't
    /// preserve declaration order through this deserializer), so built-in
    /// categories still reach the matcher in a fixed priority order via its
    /// own `SCAN_ORDER`; this only needs to preserve whatever order it's
    /// given, not impose one.
    #[must_use]
    pub fn merged_patterns(&self) -> IndexMap<String, Vec<String>> {
        let mut merged = IndexMap::new();
        for (category, config) in &self.categories {
            let mut sources = config.regexes.clone();
            sources.extend(config.shell_regexes.clone());
            merged.insert(category.clone(), sources);
            if category == "prompt" && !config.weak_regexes.is_empty() {
                merged.insert("weak_prompt".to_string(), config.weak_regexes.clone());
            }
        }
        merged
    }
}

/// `notifications.dnd.*`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DndConfig {
    /// Whether the do-not-disturb window is enforced.
    pub enabled: bool,
    /// `HH:MM` local start.
    pub start: String,
    /// `HH:MM` local end.
    pub end: String,
}

impl Default for DndConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "22:00".to_string(),
            end: "07:00".to_string(),
        }
    }
}

/// `notifications.history.*`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum retained notification events.
    pub max_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_size: 500 }
    }
}

/// One event type's routing overrides.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingOverride {
    /// Desktop notification channel.
    pub desktop: Option<bool>,
    /// Audio alert channel.
    pub audio: Option<bool>,
    /// In-app toast channel.
    pub toast: Option<bool>,
    /// Sidebar flash indicator channel.
    pub sidebar_flash: Option<bool>,
}

/// `notifications.*`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Master on/off switch.
    pub enabled: bool,
    /// Do-not-disturb window.
    pub dnd: DndConfig,
    /// Bounded history ring size.
    pub history: HistoryConfig,
    /// Per-event-type routing overrides, keyed by the event type's
    /// snake_case name (`input_needed`, `error`, `completed`, `session_idle`).
    pub routing: BTreeMap<String, RoutingOverride>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dnd: DndConfig::default(),
            history: HistoryConfig::default(),
            routing: BTreeMap::new(),
        }
    }
}

impl NotificationsConfig {
    /// Resolve the effective routing flags for `event_type`: the built-in
    /// default with any configured override applied field-by-field.
    #[must_use]
    pub fn routing_for(&self, event_type: EventType) -> crate::notify::RoutingFlags {
        let mut flags = crate::notify::default_routing(event_type);
        let key = match event_type {
            EventType::InputNeeded => "input_needed",
            EventType::Error => "error",
            EventType::Completed => "completed",
            EventType::SessionIdle => "session_idle",
        };
        if let Some(over) = self.routing.get(key) {
            if let Some(v) = over.desktop {
                flags.desktop = v;
            }
            if let Some(v) = over.audio {
                flags.audio = v;
            }
            if let Some(v) = over.toast {
                flags.toast = v;
            }
            if let Some(v) = over.sidebar_flash {
                flags.sidebar_flash = v;
            }
        }
        flags
    }
}

/// `keybindings.*`: action name → key-spec string.
pub type KeybindingsConfig = BTreeMap<String, String>;

/// `profiles.<name>.*`: per-session extra pattern sets selectable at
/// session creation.
pub type ProfilesConfig = BTreeMap<String, PatternsConfig>;

/// The fully-resolved configuration tree (spec §6).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `general.*`.
    pub general: GeneralConfig,
    /// `sessions.*`.
    pub sessions: SessionsConfig,
    /// `patterns.*`.
    pub patterns: PatternsConfig,
    /// `notifications.*`.
    pub notifications: NotificationsConfig,
    /// `keybindings.*`.
    pub keybindings: KeybindingsConfig,
    /// `profiles.*`.
    pub profiles: ProfilesConfig,
}

impl Config {
    /// Load `path`, deep-merging over [`Config::default`]: user scalars and
    /// arrays replace, tables merge recursively. If `path` doesn't exist,
    /// writes the default configuration there and returns it unmodified.
    /// If `path` is `None` and [`Config::default_path`] can't resolve one
    /// either (no home directory), returns the in-memory default without
    /// touching disk at all.
    ///
    /// # Errors
    /// [`ConfigError::Read`]/[`ConfigError::Parse`] on an existing but
    /// unreadable/invalid file; [`ConfigError::Write`] if writing the
    /// default configuration fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Ok(Self::default());
        };
        let path = path.as_path();
        if !path.exists() {
            let default = Self::default();
            Self::write_default(path, &default)?;
            return Ok(default);
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: toml::Value = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

        let default_value = toml::Value::try_from(Self::default())
            .expect("Config::default always serializes to a TOML table");
        let merged = deep_merge(default_value, value);
        merged.try_into().map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    fn write_default(path: &Path, config: &Self) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let text = toml::to_string_pretty(config).expect("Config always serializes");
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default config-file location: `$XDG_CONFIG_HOME/tame/config.toml`
    /// (or the platform equivalent via `directories`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "tame")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Deep-merge `overlay` onto `base`: scalars and arrays in `overlay`
/// replace `base`'s; tables merge key-by-key, recursing into shared keys.
fn deep_merge(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}
