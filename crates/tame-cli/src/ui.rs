//! `ratatui` rendering: sidebar session list, active viewport pane, and a
//! toast overlay.
#![allow(clippy::indexing_slicing)]

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color as RatatuiColor, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Frame;

use tame_core::state::DisplayState;
use tame_core::terminal::{CellStyle, Color as TameColor};
use tame_core::viewport::ViewportContent;

use crate::app::App;

pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(24), Constraint::Min(10)])
        .split(area);

    draw_sidebar(frame, app, columns[0]);
    draw_main(frame, app, columns[1]);
    draw_toasts(frame, app, area);
}

fn status_glyph(status: DisplayState) -> (&'static str, RatatuiColor) {
    match status {
        DisplayState::Starting => ("o", RatatuiColor::DarkGray),
        DisplayState::Active => ("*", RatatuiColor::Green),
        DisplayState::Idle => ("-", RatatuiColor::Gray),
        DisplayState::Waiting => ("?", RatatuiColor::Yellow),
        DisplayState::RunningError => ("!", RatatuiColor::Red),
        DisplayState::Paused => ("=", RatatuiColor::Blue),
        DisplayState::Done => ("v", RatatuiColor::DarkGray),
        DisplayState::Error => ("x", RatatuiColor::Red),
    }
}

fn draw_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let active = app.active_session();
    let items: Vec<ListItem> = app
        .session_order()
        .iter()
        .filter_map(|id| {
            let (name, status) = app.session_label(*id)?;
            let (glyph, color) = status_glyph(status);
            let is_active = Some(*id) == active;
            let is_flashing = app.flashing().contains(id);
            let mut style = Style::default().fg(color);
            if is_active {
                style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
            } else if is_flashing {
                style = style.add_modifier(Modifier::RAPID_BLINK);
            }
            Some(ListItem::new(Line::from(vec![
                Span::raw(format!("{glyph} ")),
                Span::raw(name),
            ]))
            .style(style))
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("sessions"));
    frame.render_widget(list, area);
}

fn draw_main(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("tame");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match app.viewport_content() {
        ViewportContent::Welcome => {
            let text = Paragraph::new("no session selected — Ctrl+N to start one");
            frame.render_widget(text, inner);
        }
        ViewportContent::Snapshot(text) | ViewportContent::Mirror(text) => {
            let text = Paragraph::new(text);
            frame.render_widget(text, inner);
        }
        ViewportContent::Scrollback(lines) => {
            let text = Paragraph::new(lines.join("\n"));
            frame.render_widget(text, inner);
        }
        ViewportContent::Live { rows, .. } => {
            let lines: Vec<Line> = rows
                .iter()
                .map(|run_row| {
                    let spans: Vec<Span> = run_row
                        .iter()
                        .map(|run| Span::styled(run.text.clone(), style_from_cell(&run.style)))
                        .collect();
                    Line::from(spans)
                })
                .collect();
            frame.render_widget(Paragraph::new(lines), inner);
        }
    }
}

fn draw_toasts(frame: &mut Frame, app: &App, area: Rect) {
    let toasts = app.visible_toasts();
    if toasts.is_empty() {
        return;
    }
    let height = u16::try_from(toasts.len()).unwrap_or(u16::MAX).saturating_add(2);
    let width = area.width.min(50);
    let toast_area = Rect {
        x: area.width.saturating_sub(width),
        y: 0,
        width,
        height: height.min(area.height),
    };
    let lines: Vec<Line> = toasts
        .iter()
        .map(|event| Line::from(format!("{}: {}", event.session_name, event.message)))
        .collect();
    let block = Block::default().borders(Borders::ALL).title("notifications");
    frame.render_widget(Paragraph::new(lines).block(block), toast_area);
}

fn style_from_cell(style: &CellStyle) -> Style {
    let mut result = Style::default().fg(ratatui_color(style.fg)).bg(ratatui_color(style.bg));
    if style.bold {
        result = result.add_modifier(Modifier::BOLD);
    }
    if style.italic {
        result = result.add_modifier(Modifier::ITALIC);
    }
    if style.underline {
        result = result.add_modifier(Modifier::UNDERLINED);
    }
    if style.strikethrough {
        result = result.add_modifier(Modifier::CROSSED_OUT);
    }
    if style.reverse {
        result = result.add_modifier(Modifier::REVERSED);
    }
    result
}

fn ratatui_color(color: TameColor) -> RatatuiColor {
    match color {
        TameColor::Default => RatatuiColor::Reset,
        TameColor::Indexed(index) => RatatuiColor::Indexed(index),
        TameColor::Rgb(r, g, b) => RatatuiColor::Rgb(r, g, b),
    }
}
