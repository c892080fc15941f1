use crate::ui::view::ShortcutInfo;
use crate::worker::{WorkerState, WorkerStatus};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// What the header shows besides the shortcuts
pub struct HeaderInfo<'a> {
  pub title: &'a str,
  pub server: &'a str,
  pub worker: Option<&'a WorkerStatus>,
  /// Data on screen came from the offline cache
  pub offline: bool,
}

/// Draw the header bar with title, server, cache state, and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, info: &HeaderInfo, shortcuts: &[ShortcutInfo]) {
  let mut spans = vec![
    Span::styled(format!(" {} ", info.title), Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", extract_domain(info.server)),
      Style::default().fg(Color::White),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
  ];

  spans.push(match info.worker {
    Some(status) => Span::styled(
      format!(" cache {} ", worker_label(status)),
      Style::default().fg(worker_color(status.state)),
    ),
    None => Span::styled(" cache ? ", Style::default().fg(Color::DarkGray)),
  });

  if info.offline {
    spans.push(Span::styled(
      " OFFLINE ",
      Style::default().fg(Color::Black).bg(Color::Yellow).bold(),
    ));
  }
  spans.push(Span::raw("  "));

  let mut sorted: Vec<&ShortcutInfo> = shortcuts.iter().collect();
  sorted.sort_by_key(|s| s.priority);
  for (i, shortcut) in sorted.iter().enumerate() {
    if i > 0 {
      spans.push(Span::raw("   "));
    }
    // Keys and brackets highlighted, descriptions dimmed
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn worker_label(status: &WorkerStatus) -> String {
  match (&status.generation, status.state) {
    (Some(generation), WorkerState::Activated) => generation.clone(),
    (Some(generation), state) => format!("{} ({})", generation, state.label()),
    (None, state) => state.label().to_string(),
  }
}

fn worker_color(state: WorkerState) -> Color {
  match state {
    WorkerState::Activated => Color::Green,
    WorkerState::Redundant => Color::Red,
    _ => Color::Yellow,
  }
}

/// Extract host and port from the server URL
fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_domain() {
    assert_eq!(extract_domain("http://localhost:8001"), "localhost:8001");
    assert_eq!(extract_domain("https://ward.example.org/app/"), "ward.example.org");
  }

  #[test]
  fn test_worker_label() {
    let mut status = WorkerStatus {
      state: WorkerState::Activated,
      generation: Some("ward-tracker-v1.0.0".to_string()),
      clients: 1,
      controlled: 1,
    };
    assert_eq!(worker_label(&status), "ward-tracker-v1.0.0");

    status.state = WorkerState::Installed;
    assert_eq!(worker_label(&status), "ward-tracker-v1.0.0 (waiting)");

    status.generation = None;
    status.state = WorkerState::Installing;
    assert_eq!(worker_label(&status), "installing");
  }
}
