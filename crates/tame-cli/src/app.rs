//! The reactor: a single-threaded event loop that owns the
//! [`tame_core::supervisor::SessionSupervisor`] and
//! [`tame_core::viewport::Viewport`], polls PTY output, forwards keyboard
//! input, and renders with `ratatui`.

use std::collections::HashSet;
use std::io;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use miette::{Context, IntoDiagnostic, Result};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use tame_core::config::Config;
use tame_core::input::{Key, KeyEvent as TameKeyEvent, Modifiers};
use tame_core::notify::{EventType, NotificationEngine, NotificationEvent};
use tame_core::sinks::{AudioSink, DesktopSink, SidebarFlashSink, ToastSink};
use tame_core::supervisor::{CreateSessionParams, SessionSupervisor, SupervisorConfig};
use tame_core::viewport::Viewport;
use tame_core::SessionId;

const MAX_VISIBLE_TOASTS: usize = 5;

const POLL_TICK: Duration = Duration::from_millis(16);

/// Top-level application state driving the reactor loop.
pub struct App {
    supervisor: SessionSupervisor,
    viewport: Viewport,
    notifications: NotificationEngine,
    toast_rx: Receiver<NotificationEvent>,
    sidebar_rx: Receiver<NotificationEvent>,
    toasts: Vec<NotificationEvent>,
    flashing: HashSet<SessionId>,
    config: Config,
    order: Vec<SessionId>,
    quit: bool,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let supervisor_config = SupervisorConfig {
            max_buffer_lines: config.general.max_buffer_lines,
            state_debounce: Duration::from_millis(config.patterns.state_debounce_ms),
            idle_threshold: Duration::from_secs_f64(config.sessions.idle_threshold_seconds),
            idle_prompt_timeout: Duration::from_secs_f64(config.patterns.idle_prompt_timeout),
        };
        let supervisor = SessionSupervisor::new(supervisor_config);
        let viewport = Viewport::new(Duration::from_millis(16));
        let mut notifications = NotificationEngine::new(
            tame_core::notify::DndWindow {
                enabled: config.notifications.dnd.enabled,
                start_minutes: parse_hhmm(&config.notifications.dnd.start),
                end_minutes: parse_hhmm(&config.notifications.dnd.end),
            },
            config.notifications.history.max_size,
        );
        for event_type in [
            EventType::InputNeeded,
            EventType::Error,
            EventType::Completed,
            EventType::SessionIdle,
        ] {
            notifications.set_routing(event_type, config.notifications.routing_for(event_type));
        }
        let (toast_tx, toast_rx) = mpsc::channel();
        let (sidebar_tx, sidebar_rx) = mpsc::channel();
        if config.notifications.enabled {
            notifications.register_sink(Box::new(ToastSink(toast_tx)), |f| f.toast);
            notifications.register_sink(Box::new(SidebarFlashSink(sidebar_tx)), |f| f.sidebar_flash);
            notifications.register_sink(Box::new(DesktopSink), |f| f.desktop);
            notifications.register_sink(Box::new(AudioSink), |f| f.audio);
        }

        let mut app = Self {
            supervisor,
            viewport,
            notifications,
            toast_rx,
            sidebar_rx,
            toasts: Vec::new(),
            flashing: HashSet::new(),
            config,
            order: Vec::new(),
            quit: false,
        };
        let id = app
            .spawn_session("1".to_string())
            .wrap_err("failed to start the initial session")?;
        app.viewport.set_active(Some(id));
        Ok(app)
    }

    /// Spawn a new shell session using `config.sessions` defaults, register
    /// it with the viewport, and append it to the session order.
    fn spawn_session(&mut self, name: String) -> Result<SessionId> {
        let shell = if self.config.sessions.default_shell.is_empty() {
            std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
        } else {
            self.config.sessions.default_shell.clone()
        };
        let cwd = if self.config.sessions.default_working_directory.is_empty() {
            std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
        } else {
            self.config.sessions.default_working_directory.clone()
        };

        let now = Instant::now();
        let id = self
            .supervisor
            .create(
                CreateSessionParams {
                    name,
                    cwd,
                    command: Some(shell),
                    args: Vec::new(),
                    group: None,
                    rows: 24,
                    cols: 80,
                    base_patterns: self.config.patterns.merged_patterns(),
                    profile_patterns: None,
                },
                now,
            )
            .into_diagnostic()?;
        self.viewport.register_session(id, 24, 80, true);
        self.order.push(id);
        Ok(id)
    }

    /// Switch the active session forward or backward in `self.order`
    /// (wrapping), clearing its flash indicator.
    fn cycle_session(&mut self, forward: bool) {
        let len = self.order.len();
        if len == 0 {
            return;
        }
        let current = self.active().and_then(|id| self.order.iter().position(|s| *s == id));
        let next = match current {
            Some(pos) if forward => (pos + 1) % len,
            Some(pos) => (pos + len - 1) % len,
            None => 0,
        };
        let Some(&id) = self.order.get(next) else {
            return;
        };
        self.viewport.set_active(Some(id));
        self.flashing.remove(&id);
    }

    /// Recently dispatched toasts, most recent last, capped for display.
    #[must_use]
    pub fn visible_toasts(&self) -> &[NotificationEvent] {
        &self.toasts
    }

    /// Sessions currently flashing in the sidebar (cleared on focus).
    #[must_use]
    pub fn flashing(&self) -> &HashSet<SessionId> {
        &self.flashing
    }

    /// Session ids in sidebar display order.
    #[must_use]
    pub fn session_order(&self) -> &[SessionId] {
        &self.order
    }

    /// The currently active session, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.active()
    }

    /// A session's display name and derived status, for the sidebar.
    #[must_use]
    pub fn session_label(&self, id: SessionId) -> Option<(String, tame_core::state::DisplayState)> {
        self.supervisor.get(id).map(|s| (s.name().to_string(), s.status()))
    }

    /// What the active viewport pane should render.
    #[must_use]
    pub fn viewport_content(&self) -> tame_core::viewport::ViewportContent {
        let Some(id) = self.active() else {
            return self.viewport.content(true, |_, _| Vec::new());
        };
        let lines = self
            .supervisor
            .get(id)
            .map(|s| s.buffer().lines())
            .unwrap_or_default();
        self.viewport.content(true, move |_, offset| {
            let start = lines.len().saturating_sub(offset);
            lines.get(start..).map(<[String]>::to_vec).unwrap_or_default()
        })
    }

    fn drain_notification_channels(&mut self) {
        while let Ok(event) = self.toast_rx.try_recv() {
            self.toasts.push(event);
            if self.toasts.len() > MAX_VISIBLE_TOASTS {
                self.toasts.remove(0);
            }
        }
        while let Ok(event) = self.sidebar_rx.try_recv() {
            self.flashing.insert(event.session_id);
        }
    }

    fn active(&self) -> Option<SessionId> {
        self.viewport.active()
    }

    fn poll_sessions(&mut self) {
        let now = Instant::now();
        self.drain_notification_channels();
        self.supervisor.tick(now);
        for id in self.order.clone() {
            let Ok(outcome) = self.supervisor.poll(id, now) else {
                continue;
            };
            if let Some(raw) = &outcome.raw_text {
                self.viewport.append_output(id, raw);
            }
            self.dispatch_notifications(id, &outcome, now);
            if outcome.exited {
                self.order.retain(|s| *s != id);
            }
        }
    }

    fn dispatch_notifications(&mut self, id: SessionId, outcome: &tame_core::supervisor::ChunkOutcome, now: Instant) {
        let Some(session) = self.supervisor.get(id) else {
            return;
        };
        let name = session.name().to_string();
        let minutes = current_minutes_since_midnight();
        if outcome.error_seen {
            self.notifications.dispatch(
                EventType::Error,
                id,
                name.clone(),
                format!("{name}: error"),
                outcome.matched_text.clone(),
                now,
                minutes,
            );
        }
        if outcome.needs_input {
            self.notifications.dispatch(
                EventType::InputNeeded,
                id,
                name.clone(),
                format!("{name}: needs input"),
                outcome.matched_text.clone(),
                now,
                minutes,
            );
        }
        if outcome.exited {
            self.notifications.dispatch(
                EventType::Completed,
                id,
                name,
                "session completed".to_string(),
                None,
                now,
                minutes,
            );
        }
    }

    fn handle_key(&mut self, key: crossterm::event::KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('q') => {
                    self.quit = true;
                    return;
                }
                KeyCode::Char('n') => {
                    let name = (self.order.len() + 1).to_string();
                    let _ = self.spawn_session(name);
                    return;
                }
                KeyCode::Right => {
                    self.cycle_session(true);
                    return;
                }
                KeyCode::Left => {
                    self.cycle_session(false);
                    return;
                }
                _ => {}
            }
        }
        let Some(id) = self.active() else { return };
        let Some(tame_key) = map_key(key) else { return };
        if let Some(session) = self.supervisor.get_mut(id) {
            session.track_input_key(tame_key);
        }
        if let Some(bytes) = tame_core::input::translate(tame_key) {
            let _ = self.supervisor.send_input(id, &bytes, Instant::now());
        }
    }
}

fn map_key(key: crossterm::event::KeyEvent) -> Option<TameKeyEvent> {
    let modifiers = Modifiers {
        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
        alt: key.modifiers.contains(KeyModifiers::ALT),
        shift: key.modifiers.contains(KeyModifiers::SHIFT),
    };
    let key_code = match key.code {
        KeyCode::Char(ch) => Key::Char(ch),
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::BackTab => Key::BackTab,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Insert => Key::Insert,
        KeyCode::Esc => Key::Escape,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        _ => return None,
    };
    Some(TameKeyEvent { key: key_code, modifiers })
}

fn parse_hhmm(value: &str) -> u16 {
    let mut parts = value.splitn(2, ':');
    let hours: u16 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minutes: u16 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    hours.saturating_mul(60).saturating_add(minutes)
}

fn current_minutes_since_midnight() -> u16 {
    let now = chrono::Local::now();
    u16::try_from(now.format("%H").to_string().parse::<u32>().unwrap_or(0) * 60
        + now.format("%M").to_string().parse::<u32>().unwrap_or(0))
    .unwrap_or(0)
}

fn spawn_input_thread() -> Receiver<Event> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || loop {
        match crossterm::event::poll(Duration::from_millis(50)) {
            Ok(true) => {
                if let Ok(event) = crossterm::event::read() {
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
            Ok(false) => {}
            Err(_) => return,
        }
    });
    rx
}

/// Run the application: set up the terminal, drive the reactor loop until
/// quit, then restore the terminal regardless of how the loop ended.
pub async fn run(config: Config, _theme: Option<String>) -> Result<()> {
    enable_raw_mode().into_diagnostic()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture).into_diagnostic()?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).into_diagnostic()?;

    let mut app = App::new(config)?;
    let events = spawn_input_thread();
    let mut ticker = tokio::time::interval(POLL_TICK);

    let loop_result = run_loop(&mut terminal, &mut app, &events, &mut ticker).await;

    disable_raw_mode().into_diagnostic()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture).into_diagnostic()?;
    terminal.show_cursor().into_diagnostic()?;

    loop_result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &Receiver<Event>,
    ticker: &mut tokio::time::Interval,
) -> Result<()> {
    loop {
        while let Ok(event) = events.try_recv() {
            if let Event::Key(key) = event {
                app.handle_key(key);
            }
        }
        app.poll_sessions();
        if app.viewport.should_refresh(Instant::now()) {
            terminal.draw(|frame| crate::ui::draw(frame, app)).into_diagnostic()?;
            app.viewport.mark_refreshed(Instant::now());
        }
        if app.quit {
            return Ok(());
        }
        ticker.tick().await;
    }
}
