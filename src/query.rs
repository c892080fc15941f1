//! Async query abstraction with stale-response suppression.
//!
//! A `Query<T>` owns one collection of server data. Every `start()` takes the
//! next sequence number; when a fetch completes, its result is applied only if
//! its number is still the latest issued, so an older, slower response can
//! never overwrite the result of a newer request.
//!
//! # Example
//!
//! ```ignore
//! let mut query = Query::new();
//!
//! let api = api.clone();
//! query.start(async move { api.get_stats().await.map_err(|e| e.to_string()) });
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use std::future::Future;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;

/// The state of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
  /// Not started, or the latest fetch succeeded
  Idle,
  /// Query is currently fetching data (previous data is kept)
  Loading,
  /// Query failed with an error (previous data is kept)
  Error(String),
}

impl QueryState {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// What a poll observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryUpdate {
  /// Latest fetch delivered data
  Updated,
  /// Latest fetch failed; the previous data is still in place
  Failed(String),
}

/// A fetch result tagged with the sequence number it was issued under
type Tagged<T> = (u64, Result<T, String>);

/// One collection of server data with loading/error state.
pub struct Query<T> {
  name: &'static str,
  state: QueryState,
  data: Option<T>,
  seq: u64,
  sender: mpsc::UnboundedSender<Tagged<T>>,
  receiver: mpsc::UnboundedReceiver<Tagged<T>>,
  fetched_at: Option<Instant>,
}

impl<T> Query<T> {
  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState {
    &self.state
  }

  /// Data of the latest successful fetch, kept across failures and reloads.
  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// When the current data arrived.
  pub fn fetched_at(&self) -> Option<Instant> {
    self.fetched_at
  }
}

impl<T: Send + 'static> Query<T> {
  pub fn new(name: &'static str) -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self {
      name,
      state: QueryState::Idle,
      data: None,
      seq: 0,
      sender,
      receiver,
      fetched_at: None,
    }
  }

  /// Issue a new fetch. Any fetch still in flight becomes stale; it runs to
  /// completion and its result is discarded.
  pub fn start<F>(&mut self, future: F) -> u64
  where
    F: Future<Output = Result<T, String>> + Send + 'static,
  {
    self.seq += 1;
    let seq = self.seq;
    self.state = QueryState::Loading;

    let sender = self.sender.clone();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - the query may have been dropped
      let _ = sender.send((seq, result));
    });
    seq
  }

  /// Drain completed fetches without blocking.
  ///
  /// Returns the update of the latest fetch if it completed since the last poll.
  pub fn poll(&mut self) -> Option<QueryUpdate> {
    let mut update = None;
    while let Ok((seq, result)) = self.receiver.try_recv() {
      if let Some(u) = self.apply(seq, result) {
        update = Some(u);
      }
    }
    update
  }

  /// Wait for the latest issued fetch to complete.
  #[cfg(test)]
  pub async fn settle(&mut self) -> Option<QueryUpdate> {
    while self.state.is_loading() {
      let (seq, result) = self.receiver.recv().await?;
      if let Some(update) = self.apply(seq, result) {
        return Some(update);
      }
    }
    None
  }

  fn apply(&mut self, seq: u64, result: Result<T, String>) -> Option<QueryUpdate> {
    if seq != self.seq {
      debug!(
        "Discarding stale {} response #{} (latest #{})",
        self.name, seq, self.seq
      );
      return None;
    }

    match result {
      Ok(data) => {
        self.data = Some(data);
        self.fetched_at = Some(Instant::now());
        self.state = QueryState::Idle;
        Some(QueryUpdate::Updated)
      }
      Err(error) => {
        self.state = QueryState::Error(error.clone());
        Some(QueryUpdate::Failed(error))
      }
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("name", &self.name)
      .field("state", &self.state)
      .field("seq", &self.seq)
      .field("fetched_at", &self.fetched_at)
      .finish_non_exhaustive()
  }
}
