use crate::sync::{SyncEvent, WardSync};
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
  /// Show a message in the footer
  Status(String),
}

/// Trait for view behavior
///
/// Views handle their own input modes (search, forms) and return actions for
/// the App to execute: App → View → Components.
///
/// Server data lives in [`WardSync`], shared by all views; a view only keeps
/// its own UI state (selection, form contents) and asks the sync layer to
/// refresh or submit.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent, sync: &mut WardSync) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect, sync: &WardSync);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Called whenever the view becomes the top of the stack
  fn on_enter(&mut self, _sync: &mut WardSync) {}

  /// Called for every event from the sync layer while the view is on top
  fn on_sync_event(&mut self, _event: &SyncEvent, _sync: &mut WardSync) -> ViewAction {
    ViewAction::None
  }

  /// True while the view takes raw text input (`:` and `q` go to the view)
  fn captures_input(&self) -> bool {
    false
  }

  /// Get keyboard shortcuts to display in the header
  /// Override this to provide view-specific shortcuts
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
