//! Notification routing, DND window, cooldowns, and history (spec §4.G).

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::ids::{NotificationId, SessionId};

/// The four event types the supervisor ever dispatches.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A prompt pattern matched; the session needs a reply.
    InputNeeded,
    /// An error pattern matched.
    Error,
    /// The session's process exited.
    Completed,
    /// The session has been idle past its threshold.
    SessionIdle,
}

/// Informational severity attached to an event for sink/sidebar styling.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// `SessionIdle`.
    Low,
    /// `Completed`.
    Medium,
    /// `InputNeeded`.
    High,
    /// `Error`.
    Critical,
}

impl EventType {
    /// Fixed priority mapping (spec §4.G.E).
    #[must_use]
    pub fn priority(self) -> Priority {
        match self {
            Self::InputNeeded => Priority::High,
            Self::Error => Priority::Critical,
            Self::Completed => Priority::Medium,
            Self::SessionIdle => Priority::Low,
        }
    }
}

/// Which sink channels an event type routes to by default.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoutingFlags {
    /// Desktop OS notification.
    pub desktop: bool,
    /// Audio alert.
    pub audio: bool,
    /// In-app toast.
    pub toast: bool,
    /// Sidebar flash indicator.
    pub sidebar_flash: bool,
}

/// `DEFAULT_ROUTING` (spec §4.G.E), keyed by event type.
#[must_use]
pub fn default_routing(event_type: EventType) -> RoutingFlags {
    match event_type {
        EventType::InputNeeded => RoutingFlags {
            desktop: true,
            audio: true,
            toast: true,
            sidebar_flash: true,
        },
        EventType::Error => RoutingFlags {
            desktop: true,
            audio: true,
            toast: true,
            sidebar_flash: true,
        },
        EventType::Completed => RoutingFlags {
            desktop: true,
            audio: true,
            toast: true,
            sidebar_flash: false,
        },
        EventType::SessionIdle => RoutingFlags {
            desktop: false,
            audio: false,
            toast: true,
            sidebar_flash: false,
        },
    }
}

/// A single notification occurrence, retained in history regardless of
/// whether it was actually dispatched to channels.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Unique id for this occurrence.
    pub id: NotificationId,
    /// Which session it concerns.
    pub session_id: SessionId,
    /// Display name of the session at dispatch time.
    pub session_name: String,
    /// What kind of event this is.
    pub event_type: EventType,
    /// Human-readable message.
    pub message: String,
    /// The pattern-matched text that triggered this, if any.
    pub matched_text: Option<String>,
    /// Priority derived from `event_type`.
    pub priority: Priority,
}

/// Do-not-disturb window, local `HH:MM` wall-clock bounds with overnight
/// wraparound support (e.g. 22:00-07:00).
#[derive(Clone, Copy, Debug)]
pub struct DndWindow {
    /// Whether the window is enforced at all.
    pub enabled: bool,
    /// Window start, minutes since local midnight.
    pub start_minutes: u16,
    /// Window end, minutes since local midnight.
    pub end_minutes: u16,
}

impl DndWindow {
    /// Whether `minutes_since_midnight` falls inside the configured window.
    #[must_use]
    pub fn contains(&self, minutes_since_midnight: u16) -> bool {
        if !self.enabled {
            return false;
        }
        if self.start_minutes <= self.end_minutes {
            (self.start_minutes..self.end_minutes).contains(&minutes_since_midnight)
        } else {
            // Overnight wrap: e.g. 22:00 to 07:00.
            minutes_since_midnight >= self.start_minutes || minutes_since_midnight < self.end_minutes
        }
    }
}

/// A sink receives fully-routed events. All implementations must be
/// fire-and-forget: errors are swallowed internally, never propagated.
pub trait NotificationSink: Send + Sync {
    /// Deliver `event`. Must not block the reactor or panic.
    fn notify(&self, event: &NotificationEvent);
}

struct RegisteredSink {
    sink: Box<dyn NotificationSink>,
    select: fn(RoutingFlags) -> bool,
}

/// Default cooldown for `Error` events (spec §4.G step 3 / property 12).
pub const DEFAULT_ERROR_COOLDOWN: Duration = Duration::from_secs(60);
/// Default cooldown for `SessionIdle` events.
pub const DEFAULT_SESSION_IDLE_COOLDOWN: Duration = Duration::from_secs(120);

/// Routes notification events to registered sinks, subject to DND and
/// per-(session, event type) cooldowns, and retains a bounded history.
pub struct NotificationEngine {
    sinks: Vec<RegisteredSink>,
    dnd: DndWindow,
    cooldowns: HashMap<EventType, Duration>,
    routing_overrides: HashMap<EventType, RoutingFlags>,
    last_fired: HashMap<(SessionId, EventType), Instant>,
    history: VecDeque<NotificationEvent>,
    history_cap: usize,
}

impl NotificationEngine {
    /// Construct an engine with the given DND window and history capacity.
    /// Sinks are registered afterward via [`Self::register_sink`] (spec
    /// §9's "register sinks at construction", modeled here as a builder
    /// step completed before the engine starts dispatching).
    #[must_use]
    pub fn new(dnd: DndWindow, history_cap: usize) -> Self {
        let mut cooldowns = HashMap::new();
        cooldowns.insert(EventType::Error, DEFAULT_ERROR_COOLDOWN);
        cooldowns.insert(EventType::SessionIdle, DEFAULT_SESSION_IDLE_COOLDOWN);
        Self {
            sinks: Vec::new(),
            dnd,
            cooldowns,
            routing_overrides: HashMap::new(),
            last_fired: HashMap::new(),
            history: VecDeque::with_capacity(history_cap.min(1024)),
            history_cap,
        }
    }

    /// Register a sink gated by a routing-flag selector (e.g.
    /// `|f| f.desktop`).
    pub fn register_sink(&mut self, sink: Box<dyn NotificationSink>, select: fn(RoutingFlags) -> bool) {
        self.sinks.push(RegisteredSink { sink, select });
    }

    /// Override the default cooldown for an event type.
    pub fn set_cooldown(&mut self, event_type: EventType, cooldown: Duration) {
        self.cooldowns.insert(event_type, cooldown);
    }

    /// Override the default routing flags for an event type (spec §6's
    /// `notifications.routing.<event_type>` overrides).
    pub fn set_routing(&mut self, event_type: EventType, flags: RoutingFlags) {
        self.routing_overrides.insert(event_type, flags);
    }

    /// Dispatch an event at time `now`. Always appends to history; only
    /// invokes sinks if outside the DND window and outside cooldown.
    pub fn dispatch(
        &mut self,
        event_type: EventType,
        session_id: SessionId,
        session_name: String,
        message: String,
        matched_text: Option<String>,
        now: Instant,
        minutes_since_midnight: u16,
    ) -> NotificationEvent {
        let event = NotificationEvent {
            id: NotificationId::new(),
            session_id,
            session_name,
            event_type,
            message,
            matched_text,
            priority: event_type.priority(),
        };

        self.history.push_back(event.clone());
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }

        if self.dnd.contains(minutes_since_midnight) {
            return event;
        }

        let key = (session_id, event_type);
        if let Some(cooldown) = self.cooldowns.get(&event_type) {
            if let Some(last) = self.last_fired.get(&key) {
                if now.duration_since(*last) < *cooldown {
                    return event;
                }
            }
        }
        self.last_fired.insert(key, now);

        let routing = self
            .routing_overrides
            .get(&event_type)
            .copied()
            .unwrap_or_else(|| default_routing(event_type));
        for registered in &self.sinks {
            if (registered.select)(routing) {
                registered.sink.notify(&event);
            }
        }

        event
    }

    /// Most recent `history_cap` events, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<NotificationEvent> {
        self.history.iter().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink(Arc<AtomicUsize>);

    impl NotificationSink for CountingSink {
        fn notify(&self, _event: &NotificationEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn no_dnd() -> DndWindow {
        DndWindow {
            enabled: false,
            start_minutes: 0,
            end_minutes: 0,
        }
    }

    #[test]
    fn cooldown_suppresses_repeat_error_within_window() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut engine = NotificationEngine::new(no_dnd(), 500);
        engine.register_sink(Box::new(CountingSink(Arc::clone(&count))), |f| f.desktop);

        let session = SessionId::new();
        let t0 = Instant::now();
        engine.dispatch(EventType::Error, session, "s".into(), "m".into(), None, t0, 600);
        engine.dispatch(
            EventType::Error,
            session,
            "s".into(),
            "m".into(),
            None,
            t0 + Duration::from_secs(10),
            600,
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dnd_window_suppresses_dispatch_but_grows_history() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut engine = NotificationEngine::new(
            DndWindow {
                enabled: true,
                start_minutes: 22 * 60,
                end_minutes: 7 * 60,
            },
            500,
        );
        engine.register_sink(Box::new(CountingSink(Arc::clone(&count))), |f| f.desktop);
        // 23:00 falls inside the overnight window.
        engine.dispatch(
            EventType::Error,
            SessionId::new(),
            "s".into(),
            "m".into(),
            None,
            Instant::now(),
            23 * 60,
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn history_ring_keeps_last_k_in_order() {
        let mut engine = NotificationEngine::new(no_dnd(), 3);
        for i in 0..5 {
            engine.dispatch(
                EventType::Completed,
                SessionId::new(),
                format!("s{i}"),
                "m".into(),
                None,
                Instant::now(),
                0,
            );
        }
        let history = engine.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].session_name, "s2");
        assert_eq!(history[2].session_name, "s4");
    }

    #[test]
    fn routing_gates_sidebar_flash_off_for_completed() {
        let flags = default_routing(EventType::Completed);
        assert!(!flags.sidebar_flash);
        assert!(flags.toast);
    }

    #[test]
    fn routing_override_is_honored_by_dispatch() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut engine = NotificationEngine::new(no_dnd(), 500);
        engine.register_sink(Box::new(CountingSink(Arc::clone(&count))), |f| f.sidebar_flash);
        engine.set_routing(
            EventType::Completed,
            RoutingFlags {
                desktop: false,
                audio: false,
                toast: true,
                sidebar_flash: true,
            },
        );
        engine.dispatch(
            EventType::Completed,
            SessionId::new(),
            "s".into(),
            "m".into(),
            None,
            Instant::now(),
            0,
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
