use crate::cache::CacheSource;
use crate::commands;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::query::{Query, QueryUpdate};
use crate::sync::{PatientForm, SyncEvent, VitalSignsForm, WardSync};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  DashboardView, PatientFormView, PatientListView, VitalSignsFormView, VitalSignsListView,
};
use crate::ui::{self, CommandEvent, CommandInput, KeyResult};
use crate::worker::notify::BACKGROUND_SYNC_TAG;
use crate::worker::{HostSignal, Notification, WorkerHandle, WorkerMessage, WorkerStatus};
use chrono::Local;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);
const WORKER_STATUS_INTERVAL: Duration = Duration::from_secs(1);
const STATUS_TTL: Duration = Duration::from_secs(8);

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,
  command: CommandInput,
  sync: WardSync,
  worker: WorkerHandle,
  host_rx: mpsc::UnboundedReceiver<HostSignal>,
  worker_status: Query<WorkerStatus>,
  /// Where the front end document came from at startup
  shell: Query<CacheSource>,
  /// Notification waiting for the user to act on it
  notification: Option<Notification>,
  status: Option<(String, Instant)>,
  title: String,
  server: String,
  wards: Vec<String>,
  was_offline: bool,
  should_quit: bool,
}

impl App {
  pub fn new(
    config: &Config,
    worker: WorkerHandle,
    host_rx: mpsc::UnboundedReceiver<HostSignal>,
    sync: WardSync,
  ) -> Self {
    Self {
      view_stack: vec![Box::new(DashboardView::new(config.wards.clone()))],
      command: CommandInput::new(),
      sync,
      worker,
      host_rx,
      worker_status: Query::new("worker status"),
      shell: Query::new("app shell"),
      notification: None,
      status: None,
      title: config.display_title(),
      server: config.server.url.clone(),
      wards: config.wards.clone(),
      was_offline: false,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Cleanup terminal, also when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    self.open_shell();
    self.refresh_worker_status();
    self.enter_top();

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        None => break,
      }
    }
    Ok(())
  }

  fn open_shell(&mut self) {
    let api = self.sync.api().clone();
    self
      .shell
      .start(async move { api.open_page("/").await.map_err(|e| e.to_string()) });
  }

  fn refresh_worker_status(&mut self) {
    let worker = self.worker.clone();
    self
      .worker_status
      .start(async move { worker.status().await.map_err(|e| e.to_string()) });
  }

  /// Apply everything that completed since the last tick
  fn tick(&mut self) {
    for event in self.sync.poll() {
      self.on_sync_event(&event);
      if let Some(view) = self.view_stack.last_mut() {
        let action = view.on_sync_event(&event, &mut self.sync);
        self.apply(action);
      }
    }

    while let Ok(signal) = self.host_rx.try_recv() {
      self.on_host_signal(signal);
    }

    match self.shell.poll() {
      Some(QueryUpdate::Updated) => {
        if let Some(CacheSource::Offline) = self.shell.data() {
          self.set_status("Offline: showing the cached front end");
        }
      }
      Some(QueryUpdate::Failed(e)) => warn!("Could not open the front end: {}", e),
      None => {}
    }

    self.worker_status.poll();
    let due = self
      .worker_status
      .fetched_at()
      .map_or(true, |at| at.elapsed() >= WORKER_STATUS_INTERVAL);
    if due && !self.worker_status.is_loading() {
      self.refresh_worker_status();
    }

    let offline = self.sync.is_offline();
    if self.was_offline && !offline {
      info!("Connection restored, requesting background sync");
      if let Err(e) = self.worker.sync(BACKGROUND_SYNC_TAG) {
        warn!("Background sync request failed: {}", e);
      }
      self.set_status("Back online");
    }
    self.was_offline = offline;
  }

  fn on_sync_event(&mut self, event: &SyncEvent) {
    match event {
      SyncEvent::LoadFailed { collection, error } => {
        self.set_status(format!("Failed to load {}: {}", collection, error));
      }
      SyncEvent::PatientCreated(patient) => {
        self.set_status(format!("Admitted {} ({})", patient.full_name, patient.patient_id));
      }
      SyncEvent::PatientUpdated(patient) => {
        self.set_status(format!("Saved {}", patient.patient_id));
      }
      SyncEvent::VitalSignsRecorded(record) => {
        self.set_status(format!("Recorded vital signs for {}", record.patient_name));
      }
      SyncEvent::SubmitFailed(error) => self.set_status(error.clone()),
      SyncEvent::PatientsLoaded | SyncEvent::VitalSignsLoaded | SyncEvent::StatsLoaded => {}
    }
  }

  fn on_host_signal(&mut self, signal: HostSignal) {
    match signal {
      HostSignal::ShowNotification(notification) => {
        info!("Showing notification: {}", notification.body);
        self.notification = Some(notification);
      }
      HostSignal::OpenWindow(path) => {
        if path == "/" {
          self.reset_root(Box::new(DashboardView::new(self.wards.clone())));
        } else {
          self.set_status(format!("Cannot open {}", path));
        }
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    if self.notification.is_some() {
      self.handle_notification_key(key);
      return;
    }

    // The command line takes every key while open; `:` opens it unless a view is taking text
    if self.command.is_active() || !self.captures_input() {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(cmd)) => {
          self.execute_command(&cmd);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled if self.command.is_active() => return,
        KeyResult::NotHandled => {}
      }
    }

    if let Some(view) = self.view_stack.last_mut() {
      let action = view.handle_key(key, &mut self.sync);
      self.apply(action);
    }
  }

  /// Enter follows the first action of the notification, Esc the last
  fn handle_notification_key(&mut self, key: KeyEvent) {
    let Some(notification) = &self.notification else {
      return;
    };
    let action = match key.code {
      KeyCode::Enter => notification.actions.first(),
      KeyCode::Esc => notification.actions.last(),
      _ => return,
    };
    let action = action.map(|a| a.action.clone());
    self.notification = None;
    if let Err(e) = self.worker.notification_click(action) {
      warn!("Notification click not delivered: {}", e);
    }
  }

  fn execute_command(&mut self, input: &str) {
    let (name, args) = commands::split_args(input);
    match name {
      "dashboard" => self.reset_root(Box::new(DashboardView::new(self.wards.clone()))),
      "patients" => self.reset_root(Box::new(PatientListView::new(self.wards.clone()))),
      "vitals" => self.reset_root(Box::new(VitalSignsListView::all())),
      "add" => self.apply(ViewAction::Push(Box::new(PatientFormView::add(
        PatientForm::new(Local::now().date_naive()),
        self.wards.clone(),
      )))),
      "record" => {
        let view = VitalSignsFormView::new(VitalSignsForm::now(), &self.sync);
        self.apply(ViewAction::Push(Box::new(view)));
      }
      "update" => match self.worker.post_message(WorkerMessage::SkipWaiting) {
        Ok(()) => self.set_status("Activating the waiting cache generation"),
        Err(e) => self.set_status(e.to_string()),
      },
      "notify" => {
        let payload = (!args.is_empty()).then(|| args.to_string());
        if let Err(e) = self.worker.push(payload) {
          self.set_status(e.to_string());
        }
      }
      "quit" => self.should_quit = true,
      "" => {}
      other => self.set_status(format!("Unknown command: {}", other)),
    }
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => {
        self.view_stack.push(view);
        self.enter_top();
      }
      ViewAction::Pop => {
        self.view_stack.pop();
        if self.view_stack.is_empty() {
          self.should_quit = true;
        } else {
          self.enter_top();
        }
      }
      ViewAction::Status(message) => self.set_status(message),
    }
  }

  fn reset_root(&mut self, view: Box<dyn View>) {
    self.view_stack.clear();
    self.view_stack.push(view);
    self.enter_top();
  }

  fn enter_top(&mut self) {
    if let Some(view) = self.view_stack.last_mut() {
      view.on_enter(&mut self.sync);
    }
  }

  fn set_status(&mut self, message: impl Into<String>) {
    self.status = Some((message.into(), Instant::now()));
  }

  fn captures_input(&self) -> bool {
    self.view_stack.last().is_some_and(|v| v.captures_input())
  }

  // Accessors for UI rendering
  pub fn render_view(&mut self, frame: &mut Frame, area: Rect) {
    if let Some(view) = self.view_stack.last_mut() {
      view.render(frame, area, &self.sync);
    }
  }

  pub fn command(&self) -> &CommandInput {
    &self.command
  }

  pub fn notification(&self) -> Option<&Notification> {
    self.notification.as_ref()
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn server(&self) -> &str {
    &self.server
  }

  pub fn worker_status(&self) -> Option<&WorkerStatus> {
    self.worker_status.data()
  }

  pub fn is_offline(&self) -> bool {
    self.sync.is_offline()
  }

  pub fn status(&self) -> Option<&str> {
    self
      .status
      .as_ref()
      .filter(|(_, at)| at.elapsed() < STATUS_TTL)
      .map(|(message, _)| message.as_str())
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self
      .view_stack
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{connect_client, FakeWardServer, BASE_URL};
  use crate::api::WardClient;
  use url::Url;

  async fn app() -> App {
    let (worker, client) = connect_client(FakeWardServer::new()).await;
    let api = WardClient::new(client, Url::parse(BASE_URL).unwrap());
    let (_host_tx, host_rx) = mpsc::unbounded_channel();
    App::new(&Config::default(), worker, host_rx, WardSync::new(api, 50))
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn command(app: &mut App, line: &str) {
    app.handle_key(key(KeyCode::Char(':')));
    for c in line.chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));
  }

  #[tokio::test]
  async fn test_commands_switch_root_view() {
    let mut app = app().await;
    assert_eq!(app.breadcrumb(), vec!["Dashboard"]);

    command(&mut app, "patients");
    assert_eq!(app.breadcrumb(), vec!["Patients"]);

    command(&mut app, "admit");
    assert_eq!(app.breadcrumb(), vec!["Patients", "Admit"]);

    // The form takes text, so `:` is typed into it
    app.handle_key(key(KeyCode::Char(':')));
    assert!(!app.command().is_active());

    app.handle_key(key(KeyCode::Esc));
    assert_eq!(app.breadcrumb(), vec!["Patients"]);

    command(&mut app, "v");
    assert_eq!(app.breadcrumb(), vec!["Vital signs"]);
  }

  #[tokio::test]
  async fn test_unknown_command_sets_status() {
    let mut app = app().await;
    command(&mut app, "xyz");
    assert_eq!(app.status(), Some("Unknown command: xyz"));
  }

  #[tokio::test]
  async fn test_q_on_root_quits() {
    let mut app = app().await;
    app.handle_key(key(KeyCode::Char('q')));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_notification_popup_takes_keys_until_answered() {
    let (worker, client) = connect_client(FakeWardServer::new()).await;
    let api = WardClient::new(client, Url::parse(BASE_URL).unwrap());
    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let mut app = App::new(&Config::default(), worker, host_rx, WardSync::new(api, 50));

    host_tx
      .send(HostSignal::ShowNotification(Notification::from_push(Some("Bed 4"))))
      .unwrap();
    app.tick();
    assert_eq!(app.notification().map(|n| n.body.as_str()), Some("Bed 4"));

    // Keys other than Enter/Esc do not reach the view
    app.handle_key(key(KeyCode::Char('q')));
    assert!(!app.should_quit);
    assert!(app.notification().is_some());

    app.handle_key(key(KeyCode::Esc));
    assert!(app.notification().is_none());
  }

  #[tokio::test]
  async fn test_open_window_resets_to_dashboard() {
    let (worker, client) = connect_client(FakeWardServer::new()).await;
    let api = WardClient::new(client, Url::parse(BASE_URL).unwrap());
    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let mut app = App::new(&Config::default(), worker, host_rx, WardSync::new(api, 50));

    command(&mut app, "patients");
    host_tx.send(HostSignal::OpenWindow("/".to_string())).unwrap();
    app.tick();
    assert_eq!(app.breadcrumb(), vec!["Dashboard"]);
  }
}
