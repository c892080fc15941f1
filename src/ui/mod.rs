mod components;
mod renderfns;
pub mod view;
pub mod views;

pub use components::{CommandEvent, CommandInput, KeyResult};

use crate::app::App;
use crate::cache::{CacheResult, CacheSource};
use crate::query::{Query, QueryState};
use crate::worker::Notification;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, ListState, Paragraph, Wrap};
use renderfns::{draw_footer, draw_header, HeaderInfo};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let info = HeaderInfo {
    title: app.title(),
    server: app.server(),
    worker: app.worker_status(),
    offline: app.is_offline(),
  };
  draw_header(frame, chunks[0], &info, &app.shortcuts());

  app.render_view(frame, chunks[1]);
  app.command().render_overlay(frame, chunks[1]);

  if let Some(notification) = app.notification() {
    draw_notification(frame, chunks[1], notification);
  }

  draw_footer(frame, chunks[2], &app.breadcrumb(), app.status());
}

/// Keep the list selection inside `0..len`
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    None => state.select(Some(0)),
    Some(i) if i >= len => state.select(Some(len - 1)),
    _ => {}
  }
}

/// List title with count, loading/error state and where the data came from
pub fn collection_title<T>(name: &str, query: &Query<CacheResult<T>>, count: usize) -> String {
  let mut title = match query.state() {
    QueryState::Loading => format!(" {} (loading...) ", name),
    QueryState::Error(e) => format!(" {} ({}) (error: {}) ", name, count, e),
    QueryState::Idle => format!(" {} ({}) ", name, count),
  };
  if let Some(result) = query.data() {
    if result.source == CacheSource::Offline {
      match result.cached_at {
        Some(at) => title.push_str(&format!(
          "[offline copy from {}] ",
          at.with_timezone(&chrono::Local).format("%H:%M")
        )),
        None => title.push_str("[offline] "),
      }
    }
  }
  title
}

fn draw_notification(frame: &mut Frame, area: Rect, notification: &Notification) {
  let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
  let height = 7.min(area.height);
  let popup = Rect::new(
    area.x + (area.width.saturating_sub(width)) / 2,
    area.y + (area.height.saturating_sub(height)) / 2,
    width,
    height,
  );
  frame.render_widget(Clear, popup);

  let mut actions = Vec::new();
  for (i, action) in notification.actions.iter().enumerate() {
    let key = if i == 0 { "Enter" } else { "Esc" };
    actions.push(Span::styled(format!("<{}>", key), Style::default().fg(Color::Cyan)));
    actions.push(Span::styled(
      format!(" {}   ", action.title),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let lines = vec![
    Line::raw(notification.body.clone()),
    Line::raw(""),
    Line::from(actions),
  ];
  let block = Block::default()
    .title(format!(" {} ", notification.title))
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow));
  frame.render_widget(
    Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
    popup,
  );
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_ensure_valid_selection() {
    let mut state = ListState::default();
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(0));

    state.select(Some(5));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));

    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);
  }

  #[test]
  fn test_collection_title() {
    let query: Query<CacheResult<Vec<u32>>> = Query::new("patients");
    assert_eq!(collection_title("Patients", &query, 2), " Patients (2) ");
  }
}
