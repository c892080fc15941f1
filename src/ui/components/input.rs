use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Result of handling a key event in an input component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputResult {
  /// Key was handled, continue input mode
  Consumed,
  /// Enter pressed, here's the submitted value
  Submitted(String),
  /// Escape pressed, input cancelled
  Cancelled,
  /// Key not handled, pass to next handler
  NotHandled,
}

/// Reusable single-line text input. The cursor counts characters, not bytes.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
  buffer: String,
  cursor: usize,
}

impl TextInput {
  pub fn new() -> Self {
    Self::default()
  }

  /// Input prefilled with `value`, cursor at the end
  pub fn with_value(value: impl Into<String>) -> Self {
    let mut input = Self::new();
    input.set_value(value);
    input
  }

  /// Get the current input value
  pub fn value(&self) -> &str {
    &self.buffer
  }

  pub fn set_value(&mut self, value: impl Into<String>) {
    self.buffer = value.into();
    self.cursor = self.char_count();
  }

  /// Clear the input
  pub fn clear(&mut self) {
    self.buffer.clear();
    self.cursor = 0;
  }

  fn char_count(&self) -> usize {
    self.buffer.chars().count()
  }

  /// Byte offset of the char at `index`
  fn byte_offset(&self, index: usize) -> usize {
    self
      .buffer
      .char_indices()
      .nth(index)
      .map(|(i, _)| i)
      .unwrap_or(self.buffer.len())
  }

  /// Handle a key event, returning the result
  pub fn handle_key(&mut self, key: KeyEvent) -> InputResult {
    match key.code {
      KeyCode::Esc => InputResult::Cancelled,
      KeyCode::Enter => InputResult::Submitted(self.buffer.clone()),
      KeyCode::Backspace => {
        if self.cursor > 0 {
          self.cursor -= 1;
          let at = self.byte_offset(self.cursor);
          self.buffer.remove(at);
        }
        InputResult::Consumed
      }
      KeyCode::Delete => {
        if self.cursor < self.char_count() {
          let at = self.byte_offset(self.cursor);
          self.buffer.remove(at);
        }
        InputResult::Consumed
      }
      KeyCode::Left => {
        self.cursor = self.cursor.saturating_sub(1);
        InputResult::Consumed
      }
      KeyCode::Right => {
        if self.cursor < self.char_count() {
          self.cursor += 1;
        }
        InputResult::Consumed
      }
      KeyCode::Home | KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::End | KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.cursor = self.char_count();
        InputResult::Consumed
      }
      KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        // Clear line before cursor
        let at = self.byte_offset(self.cursor);
        self.buffer = self.buffer[at..].to_string();
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => InputResult::NotHandled,
      KeyCode::Char(c) => {
        let at = self.byte_offset(self.cursor);
        self.buffer.insert(at, c);
        self.cursor += 1;
        InputResult::Consumed
      }
      _ => InputResult::NotHandled,
    }
  }

  /// Get cursor position (in characters) for rendering
  pub fn cursor_position(&self) -> usize {
    self.cursor
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn ctrl_key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::CONTROL)
  }

  fn type_str(input: &mut TextInput, s: &str) {
    for c in s.chars() {
      input.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_basic_input_and_submit() {
    let mut input = TextInput::new();
    assert!(input.value().is_empty());

    type_str(&mut input, "72");
    assert_eq!(input.value(), "72");
    assert_eq!(
      input.handle_key(key(KeyCode::Enter)),
      InputResult::Submitted("72".to_string())
    );
    assert_eq!(input.handle_key(key(KeyCode::Esc)), InputResult::Cancelled);
  }

  #[test]
  fn test_prefilled_value_edits_at_end() {
    let mut input = TextInput::with_value("120/8");
    input.handle_key(key(KeyCode::Char('0')));
    assert_eq!(input.value(), "120/80");
    assert_eq!(input.cursor_position(), 6);
  }

  #[test]
  fn test_multibyte_characters() {
    let mut input = TextInput::new();
    type_str(&mut input, "Peña");
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Backspace));
    assert_eq!(input.value(), "Pea");
    input.handle_key(key(KeyCode::Delete));
    assert_eq!(input.value(), "Pe");
  }

  #[test]
  fn test_cursor_movement() {
    let mut input = TextInput::new();
    type_str(&mut input, "ac");
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Char('b')));
    assert_eq!(input.value(), "abc");
  }

  #[test]
  fn test_ctrl_u_clear_before_cursor() {
    let mut input = TextInput::new();
    type_str(&mut input, "Ward 3");
    input.handle_key(key(KeyCode::Left));
    input.handle_key(ctrl_key(KeyCode::Char('u')));
    assert_eq!(input.value(), "3");
  }

  #[test]
  fn test_other_control_chars_pass_through() {
    let mut input = TextInput::new();
    assert_eq!(
      input.handle_key(ctrl_key(KeyCode::Char('s'))),
      InputResult::NotHandled
    );
    assert!(input.value().is_empty());
  }
}
