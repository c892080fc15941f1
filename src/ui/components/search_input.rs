use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by search input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Search query changed (emitted on each keystroke, empty string on cancel)
  Changed(String),
  /// Search submitted (overlay closed, filter persists)
  Submitted,
}

/// Incremental search overlay opened with `/`
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  /// Check if search is currently active
  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Activate search mode, continuing from `current`
  pub fn activate(&mut self, current: &str) {
    self.active = true;
    self.input.set_value(current);
  }

  /// Handle a key event
  /// Call this regardless of active state - `/` activates it with `current`
  pub fn handle_key(&mut self, key: KeyEvent, current: &str) -> KeyResult<SearchEvent> {
    // If not active, check for activation key
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.activate(current);
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    // Active - delegate to TextInput
    match self.input.handle_key(key) {
      InputResult::Submitted(_) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted)
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(SearchEvent::Changed(String::new()))
      }
      InputResult::Consumed => {
        KeyResult::Event(SearchEvent::Changed(self.input.value().to_string()))
      }
      InputResult::NotHandled => KeyResult::NotHandled,
    }
  }

  /// Render the search overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    // Calculate overlay dimensions - simpler than command overlay (no suggestions)
    let width = (area.width * 60 / 100).clamp(30, 60);
    let height = 3; // Just input line with borders

    // Position at top-left of content area with small margin
    let x = area.x + 1;
    let y = area.y + 1;

    let overlay_area = Rect::new(x, y, width, height);

    // Clear the area behind the overlay
    frame.render_widget(Clear, overlay_area);

    // Draw the border/block
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Search name / patient ID / ward ");

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    // Draw input line
    let input_line = Line::from(vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)), // Cursor
    ]);
    let input_para = Paragraph::new(input_line);
    frame.render_widget(input_para, inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_activation_continues_current_query() {
    let mut search = SearchInput::new();
    assert_eq!(search.handle_key(key(KeyCode::Char('x')), "An"), KeyResult::NotHandled);
    assert_eq!(search.handle_key(key(KeyCode::Char('/')), "An"), KeyResult::Handled);
    assert!(search.is_active());

    assert_eq!(
      search.handle_key(key(KeyCode::Char('a')), "An"),
      KeyResult::Event(SearchEvent::Changed("Ana".to_string()))
    );
    assert_eq!(
      search.handle_key(key(KeyCode::Enter), "Ana"),
      KeyResult::Event(SearchEvent::Submitted)
    );
    assert!(!search.is_active());
  }

  #[test]
  fn test_cancel_clears_query() {
    let mut search = SearchInput::new();
    search.activate("MAT");
    assert_eq!(
      search.handle_key(key(KeyCode::Esc), "MAT"),
      KeyResult::Event(SearchEvent::Changed(String::new()))
    );
  }
}
