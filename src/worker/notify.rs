//! Push, notification-click and background-sync handlers.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DEFAULT_TITLE: &str = "Ward Tracker";
const DEFAULT_BODY: &str = "New update from Ward Tracker";
const ICON: &str = "/android-chrome-192x192.png";
const BADGE: &str = "/favicon-32x32.png";
const VIBRATE: [u32; 3] = [200, 100, 200];

/// Tag of the background sync registered by the client.
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
  pub action: String,
  pub title: String,
  pub icon: String,
}

/// Notification the host is asked to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  pub actions: Vec<NotificationAction>,
  /// Opaque payload echoed back on click
  pub data: serde_json::Value,
}

impl Notification {
  /// Build the notification for a push message.
  ///
  /// A missing or empty payload gets the default text.
  pub fn from_push(payload: Option<&str>) -> Self {
    let body = payload
      .map(str::trim)
      .filter(|p| !p.is_empty())
      .unwrap_or(DEFAULT_BODY);

    Self {
      title: DEFAULT_TITLE.to_string(),
      body: body.to_string(),
      icon: ICON.to_string(),
      badge: BADGE.to_string(),
      vibrate: VIBRATE.to_vec(),
      actions: vec![
        NotificationAction {
          action: "explore".to_string(),
          title: "View Details".to_string(),
          icon: ICON.to_string(),
        },
        NotificationAction {
          action: "close".to_string(),
          title: "Close".to_string(),
          icon: ICON.to_string(),
        },
      ],
      data: serde_json::json!({
        "date_of_arrival": chrono::Utc::now().timestamp_millis(),
        "primary_key": 1,
      }),
    }
  }
}

/// Page to open for a clicked notification action, if any.
pub fn on_notification_click(action: Option<&str>) -> Option<String> {
  match action {
    Some("explore") => Some("/".to_string()),
    Some(other) => {
      debug!("Notification action {} needs no window", other);
      None
    }
    None => None,
  }
}

/// Acknowledge a background sync. Returns whether the tag was recognised.
pub fn on_sync(tag: &str) -> bool {
  if tag == BACKGROUND_SYNC_TAG {
    info!("Background sync triggered");
    true
  } else {
    debug!("Ignoring sync with unknown tag {}", tag);
    false
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_push_without_payload_uses_default_body() {
    let notification = Notification::from_push(None);
    assert_eq!(notification.body, DEFAULT_BODY);
    assert_eq!(notification.vibrate, vec![200, 100, 200]);
    assert_eq!(
      notification
        .actions
        .iter()
        .map(|a| a.action.as_str())
        .collect::<Vec<_>>(),
      vec!["explore", "close"]
    );

    assert_eq!(Notification::from_push(Some("  ")).body, DEFAULT_BODY);
  }

  #[test]
  fn test_push_payload_becomes_body() {
    let notification = Notification::from_push(Some("Bed 4 SpO2 below 92%"));
    assert_eq!(notification.body, "Bed 4 SpO2 below 92%");
    assert_eq!(notification.icon, ICON);
  }

  #[test]
  fn test_notification_click() {
    assert_eq!(on_notification_click(Some("explore")), Some("/".to_string()));
    assert_eq!(on_notification_click(Some("close")), None);
    assert_eq!(on_notification_click(None), None);
  }

  #[test]
  fn test_sync_tag() {
    assert!(on_sync("background-sync"));
    assert!(!on_sync("other"));
  }
}
