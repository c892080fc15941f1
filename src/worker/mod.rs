//! In-process request interceptor.
//!
//! The worker runs as its own tokio task and is driven entirely by
//! [`WorkerEvent`]s: clients connect, send fetches and messages, the host
//! forwards push/notification/sync signals. Lifecycle work (install, activate)
//! and every fetch run as spawned tasks so a slow request never blocks the
//! event loop.

pub mod lifecycle;
pub mod notify;
pub mod transport;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cache::FetchPolicy;
use crate::error::FetchError;
use lifecycle::{InstallOutcome, LifecycleController, Startup};
pub use notify::Notification;
use transport::{FetchRequest, FetchResponse, Transport};

/// Lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Parsed,
  Installing,
  /// Installed and waiting for activation
  Installed,
  Activating,
  Activated,
  /// Install or activation failed
  Redundant,
}

impl WorkerState {
  pub fn label(&self) -> &'static str {
    match self {
      WorkerState::Parsed => "parsed",
      WorkerState::Installing => "installing",
      WorkerState::Installed => "waiting",
      WorkerState::Activating => "activating",
      WorkerState::Activated => "active",
      WorkerState::Redundant => "redundant",
    }
  }
}

/// Messages a client can post to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMessage {
  /// Activate a waiting generation without waiting for clients to exit
  SkipWaiting,
}

/// Requests from the worker to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
  ShowNotification(Notification),
  OpenWindow(String),
}

/// Snapshot of the worker for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
  pub state: WorkerState,
  /// Generation currently serving requests
  pub generation: Option<String>,
  pub clients: usize,
  pub controlled: usize,
}

type ClientId = u64;
type FetchReply = oneshot::Sender<Result<FetchResponse, FetchError>>;

enum WorkerEvent {
  Connect(ClientId),
  Disconnect(ClientId),
  Fetch {
    client: ClientId,
    request: FetchRequest,
    reply: FetchReply,
  },
  Message(WorkerMessage),
  Push(Option<String>),
  NotificationClick(Option<String>),
  Sync(String),
  Status(oneshot::Sender<WorkerStatus>),
  Installed(Result<InstallOutcome, FetchError>),
  Activated(Result<Vec<String>, FetchError>),
}

/// Connected clients and whether the worker controls them.
#[derive(Debug, Default)]
struct ClientRegistry {
  clients: HashMap<ClientId, bool>,
}

impl ClientRegistry {
  fn connect(&mut self, id: ClientId, controlled: bool) {
    self.clients.insert(id, controlled);
  }

  fn disconnect(&mut self, id: ClientId) {
    self.clients.remove(&id);
  }

  fn is_controlled(&self, id: ClientId) -> bool {
    self.clients.get(&id).copied().unwrap_or(false)
  }

  /// Take control of every connected client. Returns how many were newly claimed.
  fn claim(&mut self) -> usize {
    let mut claimed = 0;
    for controlled in self.clients.values_mut() {
      if !*controlled {
        *controlled = true;
        claimed += 1;
      }
    }
    claimed
  }

  fn len(&self) -> usize {
    self.clients.len()
  }

  fn is_empty(&self) -> bool {
    self.clients.is_empty()
  }

  fn controlled(&self) -> usize {
    self.clients.values().filter(|c| **c).count()
  }
}

/// The worker task state.
pub struct ServiceWorker {
  lifecycle: Arc<LifecycleController>,
  policy: Arc<FetchPolicy>,
  /// Used directly for clients the worker does not control
  transport: Arc<dyn Transport>,
  state: WorkerState,
  skip_waiting: bool,
  serving: Option<String>,
  clients: ClientRegistry,
  /// Weak so the task stops once every handle and client is gone
  events: mpsc::WeakUnboundedSender<WorkerEvent>,
  host: mpsc::UnboundedSender<HostSignal>,
}

impl ServiceWorker {
  /// Start the worker task.
  ///
  /// Returns the handle used to talk to the worker and the receiver of
  /// signals the worker sends back to the host.
  pub fn spawn(
    lifecycle: LifecycleController,
    policy: FetchPolicy,
    transport: Arc<dyn Transport>,
  ) -> (WorkerHandle, mpsc::UnboundedReceiver<HostSignal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (host_tx, host_rx) = mpsc::unbounded_channel();

    let worker = Self {
      lifecycle: Arc::new(lifecycle),
      policy: Arc::new(policy),
      transport,
      state: WorkerState::Parsed,
      skip_waiting: false,
      serving: None,
      clients: ClientRegistry::default(),
      events: tx.downgrade(),
      host: host_tx,
    };
    tokio::spawn(worker.run(rx));

    let handle = WorkerHandle {
      tx,
      next_client: Arc::new(AtomicU64::new(1)),
    };
    (handle, host_rx)
  }

  async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WorkerEvent>) {
    self.start().await;

    while let Some(event) = rx.recv().await {
      self.handle(event);
    }
    debug!("Worker stopped, all handles dropped");
  }

  async fn start(&mut self) {
    let startup = self.lifecycle.register().await;
    self.serving = self.lifecycle.serving().await;

    match startup {
      Ok(Startup::Resume) => self.state = WorkerState::Activated,
      Ok(Startup::ActivateWaiting) => {
        self.state = WorkerState::Installed;
        self.begin_activation();
      }
      Ok(Startup::Install) => self.begin_install(),
      Err(e) => {
        warn!("Failed to restore worker registration: {}", e);
        self.begin_install();
      }
    }
  }

  fn handle(&mut self, event: WorkerEvent) {
    match event {
      WorkerEvent::Connect(id) => {
        // Only a worker with a generation to serve takes control on connect
        let controlled = self.serving.is_some();
        self.clients.connect(id, controlled);
        debug!("Client {} connected (controlled: {})", id, controlled);
      }
      WorkerEvent::Disconnect(id) => {
        self.clients.disconnect(id);
        debug!("Client {} disconnected", id);
        if self.state == WorkerState::Installed && self.clients.is_empty() {
          info!("Last client exited, activating waiting generation");
          self.begin_activation();
        }
      }
      WorkerEvent::Fetch {
        client,
        request,
        reply,
      } => self.fetch(client, request, reply),
      WorkerEvent::Message(WorkerMessage::SkipWaiting) => self.skip_waiting(),
      WorkerEvent::Push(payload) => {
        let notification = Notification::from_push(payload.as_deref());
        self.signal(HostSignal::ShowNotification(notification));
      }
      WorkerEvent::NotificationClick(action) => {
        if let Some(url) = notify::on_notification_click(action.as_deref()) {
          self.signal(HostSignal::OpenWindow(url));
        }
      }
      WorkerEvent::Sync(tag) => {
        notify::on_sync(&tag);
      }
      WorkerEvent::Status(reply) => {
        let _ = reply.send(WorkerStatus {
          state: self.state,
          generation: self.serving.clone(),
          clients: self.clients.len(),
          controlled: self.clients.controlled(),
        });
      }
      WorkerEvent::Installed(result) => self.on_installed(result),
      WorkerEvent::Activated(result) => self.on_activated(result),
    }
  }

  fn fetch(&self, client: ClientId, request: FetchRequest, reply: FetchReply) {
    if self.clients.is_controlled(client) {
      let policy = self.policy.clone();
      tokio::spawn(async move {
        let _ = reply.send(policy.handle(&request).await);
      });
    } else {
      let transport = self.transport.clone();
      tokio::spawn(async move {
        let _ = reply.send(transport.send(&request).await);
      });
    }
  }

  fn skip_waiting(&mut self) {
    self.skip_waiting = true;
    match self.state {
      WorkerState::Installed => self.begin_activation(),
      WorkerState::Installing => debug!("Skip waiting requested during install"),
      state => debug!("Skip waiting ignored in state {:?}", state),
    }
  }

  fn begin_install(&mut self) {
    let Some(events) = self.events.upgrade() else {
      debug!("No handles left, not installing");
      return;
    };
    self.state = WorkerState::Installing;
    let lifecycle = self.lifecycle.clone();
    tokio::spawn(async move {
      let result = lifecycle.install().await;
      let _ = events.send(WorkerEvent::Installed(result));
    });
  }

  fn on_installed(&mut self, result: Result<InstallOutcome, FetchError>) {
    match result {
      Ok(InstallOutcome::Activate) => self.begin_activation(),
      Ok(InstallOutcome::Wait) if self.skip_waiting => self.begin_activation(),
      Ok(InstallOutcome::Wait) => {
        self.state = WorkerState::Installed;
        if self.clients.is_empty() {
          self.begin_activation();
        }
      }
      Err(e) => {
        warn!("Install failed, worker is redundant: {}", e);
        self.state = WorkerState::Redundant;
      }
    }
  }

  fn begin_activation(&mut self) {
    let Some(events) = self.events.upgrade() else {
      debug!("No handles left, not activating");
      return;
    };
    self.state = WorkerState::Activating;
    let lifecycle = self.lifecycle.clone();
    tokio::spawn(async move {
      let result = lifecycle.activate().await;
      let _ = events.send(WorkerEvent::Activated(result));
    });
  }

  fn on_activated(&mut self, result: Result<Vec<String>, FetchError>) {
    match result {
      Ok(deleted) => {
        self.state = WorkerState::Activated;
        self.serving = Some(self.lifecycle.generation().to_string());
        let claimed = self.clients.claim();
        info!(
          "Worker active, removed {} old generation(s), claimed {} client(s)",
          deleted.len(),
          claimed
        );
      }
      Err(e) => {
        warn!("Activation failed, worker is redundant: {}", e);
        self.state = WorkerState::Redundant;
      }
    }
  }

  fn signal(&self, signal: HostSignal) {
    if self.host.send(signal).is_err() {
      debug!("Host is gone, dropped signal");
    }
  }
}

/// Host-side handle of the worker.
#[derive(Clone)]
pub struct WorkerHandle {
  tx: mpsc::UnboundedSender<WorkerEvent>,
  next_client: Arc<AtomicU64>,
}

impl WorkerHandle {
  /// Connect a new client (a page, in browser terms).
  pub fn connect(&self) -> Result<ClientHandle, FetchError> {
    let id = self.next_client.fetch_add(1, Ordering::SeqCst);
    self.send(WorkerEvent::Connect(id))?;
    Ok(ClientHandle {
      inner: Arc::new(ClientInner {
        id,
        tx: self.tx.clone(),
      }),
    })
  }

  pub fn post_message(&self, message: WorkerMessage) -> Result<(), FetchError> {
    self.send(WorkerEvent::Message(message))
  }

  pub fn push(&self, payload: Option<String>) -> Result<(), FetchError> {
    self.send(WorkerEvent::Push(payload))
  }

  pub fn notification_click(&self, action: Option<String>) -> Result<(), FetchError> {
    self.send(WorkerEvent::NotificationClick(action))
  }

  pub fn sync(&self, tag: impl Into<String>) -> Result<(), FetchError> {
    self.send(WorkerEvent::Sync(tag.into()))
  }

  pub async fn status(&self) -> Result<WorkerStatus, FetchError> {
    let (reply, rx) = oneshot::channel();
    self.send(WorkerEvent::Status(reply))?;
    rx.await.map_err(|_| FetchError::WorkerUnavailable)
  }

  fn send(&self, event: WorkerEvent) -> Result<(), FetchError> {
    self
      .tx
      .send(event)
      .map_err(|_| FetchError::WorkerUnavailable)
  }
}

struct ClientInner {
  id: ClientId,
  tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl Drop for ClientInner {
  fn drop(&mut self) {
    let _ = self.tx.send(WorkerEvent::Disconnect(self.id));
  }
}

/// Client-side proxy: every request of a client goes through here.
///
/// Clones share one connection; the client disconnects when the last clone
/// is dropped.
#[derive(Clone)]
pub struct ClientHandle {
  inner: Arc<ClientInner>,
}

impl ClientHandle {
  pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
    let (reply, rx) = oneshot::channel();
    self
      .inner
      .tx
      .send(WorkerEvent::Fetch {
        client: self.inner.id,
        request,
        reply,
      })
      .map_err(|_| FetchError::WorkerUnavailable)?;
    rx.await.map_err(|_| FetchError::WorkerUnavailable)?
  }
}
