use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Events emitted by the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// Ctrl-S, or Enter on the last field
  Submit,
  /// Esc
  Cancel,
}

/// A choice of a choice field: (value sent, label shown)
pub type Choice = (String, String);

#[derive(Debug, Clone)]
enum FieldInput {
  Text(TextInput),
  Choice { choices: Vec<Choice>, index: usize },
}

#[derive(Debug, Clone)]
pub struct FormField {
  key: &'static str,
  label: &'static str,
  required: bool,
  input: FieldInput,
}

impl FormField {
  pub fn text(key: &'static str, label: &'static str, value: impl Into<String>) -> Self {
    Self {
      key,
      label,
      required: false,
      input: FieldInput::Text(TextInput::with_value(value)),
    }
  }

  /// Field cycling through `choices` with Left/Right, starting at `value`
  pub fn choice(key: &'static str, label: &'static str, choices: Vec<Choice>, value: &str) -> Self {
    let index = choices.iter().position(|(v, _)| v == value).unwrap_or(0);
    Self {
      key,
      label,
      required: false,
      input: FieldInput::Choice { choices, index },
    }
  }

  pub fn required(mut self) -> Self {
    self.required = true;
    self
  }

  pub fn value(&self) -> &str {
    match &self.input {
      FieldInput::Text(input) => input.value(),
      FieldInput::Choice { choices, index } => choices.get(*index).map_or("", |(v, _)| v),
    }
  }

  fn display(&self) -> &str {
    match &self.input {
      FieldInput::Text(input) => input.value(),
      FieldInput::Choice { choices, index } => choices.get(*index).map_or("", |(_, l)| l),
    }
  }
}

/// Vertical form of labelled fields.
#[derive(Debug, Clone)]
pub struct Form {
  fields: Vec<FormField>,
  selected: usize,
}

impl Form {
  pub fn new(fields: Vec<FormField>) -> Self {
    Self {
      fields,
      selected: 0,
    }
  }

  /// Value of the field with `key`, if the form has one
  pub fn value(&self, key: &str) -> Option<&str> {
    self.fields.iter().find(|f| f.key == key).map(|f| f.value())
  }

  #[cfg(test)]
  pub fn selected_key(&self) -> Option<&'static str> {
    self.fields.get(self.selected).map(|f| f.key)
  }

  /// Move the cursor to the field labelled `label`
  pub fn focus_label(&mut self, label: &str) {
    if let Some(index) = self.fields.iter().position(|f| f.label == label) {
      self.selected = index;
    }
  }

  fn next(&mut self) {
    if !self.fields.is_empty() {
      self.selected = (self.selected + 1) % self.fields.len();
    }
  }

  fn previous(&mut self) {
    if !self.fields.is_empty() {
      self.selected = self
        .selected
        .checked_sub(1)
        .unwrap_or(self.fields.len() - 1);
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
      return KeyResult::Event(FormEvent::Submit);
    }

    match key.code {
      KeyCode::Esc => return KeyResult::Event(FormEvent::Cancel),
      KeyCode::Tab | KeyCode::Down => {
        self.next();
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.previous();
        return KeyResult::Handled;
      }
      KeyCode::Enter => {
        if self.selected + 1 >= self.fields.len() {
          return KeyResult::Event(FormEvent::Submit);
        }
        self.next();
        return KeyResult::Handled;
      }
      _ => {}
    }

    let Some(field) = self.fields.get_mut(self.selected) else {
      return KeyResult::NotHandled;
    };
    match &mut field.input {
      FieldInput::Text(input) => match input.handle_key(key) {
        InputResult::Consumed => KeyResult::Handled,
        _ => KeyResult::NotHandled,
      },
      FieldInput::Choice { choices, index } => {
        if choices.is_empty() {
          return KeyResult::NotHandled;
        }
        match key.code {
          KeyCode::Right | KeyCode::Char(' ') => {
            *index = (*index + 1) % choices.len();
            KeyResult::Handled
          }
          KeyCode::Left => {
            *index = index.checked_sub(1).unwrap_or(choices.len() - 1);
            KeyResult::Handled
          }
          _ => KeyResult::NotHandled,
        }
      }
    }
  }

  /// Render the fields inside `block`, with an optional message line at the bottom
  pub fn render(&self, frame: &mut Frame, area: Rect, block: Block, message: Option<Line>) {
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let label_width = self
      .fields
      .iter()
      .map(|f| f.label.chars().count())
      .max()
      .unwrap_or(0)
      + 2;

    let mut lines: Vec<Line> = self
      .fields
      .iter()
      .enumerate()
      .map(|(i, field)| {
        let is_selected = i == self.selected;
        let marker = if field.required { "*" } else { " " };
        let label_style = if is_selected {
          Style::default().fg(Color::Yellow).bold()
        } else {
          Style::default().fg(Color::DarkGray)
        };

        let mut spans = vec![
          Span::styled(if is_selected { "> " } else { "  " }, label_style),
          Span::styled(
            format!("{:<width$}", format!("{}{}", field.label, marker), width = label_width),
            label_style,
          ),
        ];
        match &field.input {
          FieldInput::Choice { .. } => {
            spans.push(Span::styled("< ", Style::default().fg(Color::DarkGray)));
            spans.push(Span::styled(
              field.display().to_string(),
              Style::default().fg(Color::Cyan),
            ));
            spans.push(Span::styled(" >", Style::default().fg(Color::DarkGray)));
          }
          FieldInput::Text(input) => {
            spans.push(Span::raw(field.display().to_string()));
            if is_selected && input.cursor_position() == input.value().chars().count() {
              spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
            }
          }
        }
        Line::from(spans)
      })
      .collect();

    if let Some(message) = message {
      lines.push(Line::raw(""));
      lines.push(message);
    }

    frame.render_widget(Paragraph::new(lines), inner);
  }
}

/// Bordered block used by the forms
pub fn form_block(title: String) -> Block<'static> {
  Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn form() -> Form {
    Form::new(vec![
      FormField::text("heart_rate", "Heart rate", "").required(),
      FormField::choice(
        "iv_fluids_status",
        "IV status",
        vec![
          ("running".to_string(), "Running".to_string()),
          ("completed".to_string(), "Completed".to_string()),
        ],
        "completed",
      ),
      FormField::text("notes", "Notes", "none"),
    ])
  }

  #[test]
  fn test_typing_goes_to_selected_field() {
    let mut form = form();
    form.handle_key(key(KeyCode::Char('7')));
    form.handle_key(key(KeyCode::Char('2')));
    assert_eq!(form.value("heart_rate"), Some("72"));
    assert_eq!(form.value("notes"), Some("none"));
    assert_eq!(form.value("spo2"), None);
  }

  #[test]
  fn test_choice_cycles() {
    let mut form = form();
    assert_eq!(form.value("iv_fluids_status"), Some("completed"));

    form.handle_key(key(KeyCode::Tab));
    assert_eq!(form.selected_key(), Some("iv_fluids_status"));
    form.handle_key(key(KeyCode::Right));
    assert_eq!(form.value("iv_fluids_status"), Some("running"));
    form.handle_key(key(KeyCode::Left));
    assert_eq!(form.value("iv_fluids_status"), Some("completed"));
  }

  #[test]
  fn test_enter_advances_then_submits() {
    let mut form = form();
    assert_eq!(form.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    assert_eq!(form.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    assert_eq!(
      form.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(FormEvent::Submit)
    );
    assert_eq!(
      form.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL)),
      KeyResult::Event(FormEvent::Submit)
    );
    assert_eq!(
      form.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(FormEvent::Cancel)
    );
  }

  #[test]
  fn test_up_wraps_around() {
    let mut form = form();
    form.handle_key(key(KeyCode::Up));
    assert_eq!(form.selected_key(), Some("notes"));
    form.focus_label("Heart rate");
    assert_eq!(form.selected_key(), Some("heart_rate"));
  }
}
