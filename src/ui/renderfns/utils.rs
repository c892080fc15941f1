use ratatui::prelude::Color;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color for a pain score (0-10)
pub fn pain_color(score: i32) -> Color {
  match score {
    s if s >= 7 => Color::Red,
    s if s >= 4 => Color::Yellow,
    _ => Color::Green,
  }
}
