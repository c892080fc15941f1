//! Fetch policy: decides per request between network-first and cache-first
//! and keeps the active generation populated.

use reqwest::Method;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};
use url::Url;

use super::storage::CacheStorage;
use super::traits::{CacheSource, CachedEntry, CachedResponse, RequestKey};
use crate::error::FetchError;
use crate::worker::transport::{FetchRequest, FetchResponse, Transport};

/// Pointer to the generation that serves intercepted requests.
///
/// Cache reads and writes hold the lock shared; activation holds it exclusively
/// while it deletes superseded generations, so no request ever resolves
/// against a generation that is being removed.
#[derive(Debug, Clone, Default)]
pub struct ActiveGeneration(Arc<RwLock<Option<String>>>);

impl ActiveGeneration {
  pub fn new(name: Option<String>) -> Self {
    Self(Arc::new(RwLock::new(name)))
  }

  pub async fn current(&self) -> Option<String> {
    self.0.read().await.clone()
  }

  pub async fn read(&self) -> RwLockReadGuard<'_, Option<String>> {
    self.0.read().await
  }

  pub async fn write(&self) -> RwLockWriteGuard<'_, Option<String>> {
    self.0.write().await
  }
}

/// Strategy applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// Live data first, stored copy when the network fails
  NetworkFirst,
  /// Stored copy first, network on miss
  CacheFirst,
}

/// Request interceptor logic.
///
/// Side effects are confined to the active generation of the cache store.
pub struct FetchPolicy {
  storage: Arc<dyn CacheStorage>,
  transport: Arc<dyn Transport>,
  active: ActiveGeneration,
  api_prefix: String,
  /// Document substituted for failed navigations
  offline_document: Url,
}

impl FetchPolicy {
  pub fn new(
    storage: Arc<dyn CacheStorage>,
    transport: Arc<dyn Transport>,
    active: ActiveGeneration,
    api_prefix: impl Into<String>,
    offline_document: Url,
  ) -> Self {
    Self {
      storage,
      transport,
      active,
      api_prefix: api_prefix.into(),
      offline_document,
    }
  }

  /// API paths are network-first; everything else is a static asset.
  pub fn classify(&self, request: &FetchRequest) -> Strategy {
    let path = request.url.path();
    let bare_prefix = self.api_prefix.trim_end_matches('/');
    if path.starts_with(&self.api_prefix) || path == bare_prefix {
      Strategy::NetworkFirst
    } else {
      Strategy::CacheFirst
    }
  }

  /// Resolve a request to exactly one response or one error.
  pub async fn handle(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
    match self.classify(request) {
      Strategy::NetworkFirst => self.network_first(request).await,
      Strategy::CacheFirst => self.cache_first(request).await,
    }
  }

  async fn network_first(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
    let key = RequestKey::for_request(request);

    match self.transport.send(request).await {
      Ok(response) => {
        if is_storable(request, &response) {
          self.store(&key, &response).await;
        }
        Ok(response)
      }
      Err(err) => match self.lookup(&key).await {
        Some(entry) => {
          warn!("Network failed for {}, serving cached copy: {}", key, err);
          Ok(FetchResponse::from_cache(entry, CacheSource::Offline))
        }
        None => {
          debug!("Network failed for {} and nothing is cached", key);
          Err(err)
        }
      },
    }
  }

  async fn cache_first(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
    let key = RequestKey::for_request(request);

    if let Some(entry) = self.lookup(&key).await {
      debug!("Cache hit for {}", key);
      return Ok(FetchResponse::from_cache(entry, CacheSource::Cache));
    }

    match self.transport.send(request).await {
      Ok(response) => Ok(response),
      Err(err) if request.is_navigation() => {
        let fallback = RequestKey::get(&self.offline_document);
        match self.lookup(&fallback).await {
          Some(entry) => {
            warn!("Navigation to {} failed, serving offline document", key);
            Ok(FetchResponse::from_cache(entry, CacheSource::Offline))
          }
          None => Err(err),
        }
      }
      Err(err) => Err(err),
    }
  }

  async fn lookup(&self, key: &RequestKey) -> Option<CachedEntry> {
    let active = self.active.read().await;
    let generation = active.as_deref()?;

    match self.storage.get(generation, key) {
      Ok(entry) => entry,
      Err(e) => {
        warn!("Cache read for {} failed: {}", key, e);
        None
      }
    }
  }

  /// Write-through of a clone of `response`; failures never reach the caller.
  async fn store(&self, key: &RequestKey, response: &FetchResponse) {
    let active = self.active.read().await;
    let Some(generation) = active.as_deref() else {
      return;
    };

    let snapshot = CachedResponse::from(response);
    match self.storage.put(generation, key, &snapshot) {
      Ok(true) => debug!("Stored {} in {}", key, generation),
      Ok(false) => debug!("Generation {} is gone, dropped {}", generation, key),
      Err(e) => warn!("Cache write for {} failed: {}", key, e),
    }
  }
}

/// Only GET responses can be stored, and never partial content.
fn is_storable(request: &FetchRequest, response: &FetchResponse) -> bool {
  request.method == Method::GET && response.status != 206
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;
  use crate::testing::ScriptedTransport;

  const GENERATION: &str = "ward-tracker-v1.0.0";

  fn url(path: &str) -> Url {
    Url::parse("http://ward.local").unwrap().join(path).unwrap()
  }

  fn setup() -> (FetchPolicy, Arc<SqliteStorage>, Arc<ScriptedTransport>) {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage
      .install_generation(
        GENERATION,
        &[(
          RequestKey::get(&url("/")),
          CachedResponse {
            status: 200,
            headers: Vec::new(),
            body: b"<html>shell</html>".to_vec(),
          },
        )],
      )
      .unwrap();

    let transport = ScriptedTransport::new();
    let policy = FetchPolicy::new(
      storage.clone(),
      transport.clone(),
      ActiveGeneration::new(Some(GENERATION.to_string())),
      "/api/",
      url("/"),
    );
    (policy, storage, transport)
  }

  #[test]
  fn test_classify() {
    let (policy, _, _) = setup();
    let classify = |path: &str| policy.classify(&FetchRequest::get(url(path)));

    assert_eq!(classify("/api/patients?ward=1"), Strategy::NetworkFirst);
    assert_eq!(classify("/api"), Strategy::NetworkFirst);
    assert_eq!(classify("/"), Strategy::CacheFirst);
    assert_eq!(classify("/static/js/bundle.js"), Strategy::CacheFirst);
    assert_eq!(classify("/apiary"), Strategy::CacheFirst);
  }

  #[tokio::test]
  async fn test_network_first_writes_through() {
    let (policy, storage, transport) = setup();
    transport.respond("GET /api/patients", 200, r#"[{"id":"1"}]"#);

    let request = FetchRequest::get(url("/api/patients"));
    let response = policy.handle(&request).await.unwrap();

    assert_eq!(response.source, CacheSource::Network);
    assert_eq!(response.body, br#"[{"id":"1"}]"#.to_vec());

    let stored = storage
      .get(GENERATION, &RequestKey::for_request(&request))
      .unwrap()
      .unwrap();
    assert_eq!(stored.response, CachedResponse::from(&response));
  }

  #[tokio::test]
  async fn test_network_first_falls_back_to_cache_when_offline() {
    let (policy, _, transport) = setup();
    transport.respond("GET /api/stats/overview", 200, r#"{"total_patients":3}"#);

    let request = FetchRequest::get(url("/api/stats/overview"));
    policy.handle(&request).await.unwrap();

    transport.set_offline(true);
    let response = policy.handle(&request).await.unwrap();
    assert_eq!(response.source, CacheSource::Offline);
    assert_eq!(response.body, br#"{"total_patients":3}"#.to_vec());
    assert!(response.cached_at.is_some());
  }

  #[tokio::test]
  async fn test_network_first_propagates_failure_without_cache() {
    let (policy, _, transport) = setup();
    transport.set_offline(true);

    let err = policy
      .handle(&FetchRequest::get(url("/api/vital-signs?limit=50")))
      .await
      .unwrap_err();
    assert!(err.is_network());
  }

  #[tokio::test]
  async fn test_network_first_overwrites_previous_entry() {
    let (policy, storage, transport) = setup();
    let request = FetchRequest::get(url("/api/patients"));

    transport.respond("GET /api/patients", 200, "[]");
    policy.handle(&request).await.unwrap();
    transport.respond("GET /api/patients", 200, r#"[{"id":"2"}]"#);
    policy.handle(&request).await.unwrap();

    let stored = storage
      .get(GENERATION, &RequestKey::for_request(&request))
      .unwrap()
      .unwrap();
    assert_eq!(stored.response.body, br#"[{"id":"2"}]"#.to_vec());
  }

  #[tokio::test]
  async fn test_post_is_not_stored() {
    let (policy, storage, transport) = setup();
    transport.respond("POST /api/patients", 200, r#"{"id":"1"}"#);

    let request =
      FetchRequest::json(Method::POST, url("/api/patients"), &serde_json::json!({})).unwrap();
    policy.handle(&request).await.unwrap();

    assert!(storage
      .get(GENERATION, &RequestKey::for_request(&request))
      .unwrap()
      .is_none());
  }

  #[tokio::test]
  async fn test_cache_first_hit_skips_network() {
    let (policy, _, transport) = setup();

    let response = policy.handle(&FetchRequest::get(url("/"))).await.unwrap();

    assert_eq!(response.source, CacheSource::Cache);
    assert_eq!(response.body, b"<html>shell</html>".to_vec());
    assert_eq!(transport.call_count(), 0);
  }

  #[tokio::test]
  async fn test_cache_first_miss_goes_to_network_without_storing() {
    let (policy, storage, transport) = setup();
    transport.respond("GET /manifest.json", 200, "{}");

    let request = FetchRequest::get(url("/manifest.json"));
    let response = policy.handle(&request).await.unwrap();

    assert_eq!(response.source, CacheSource::Network);
    assert_eq!(transport.calls(), vec!["GET /manifest.json".to_string()]);
    assert!(storage
      .get(GENERATION, &RequestKey::for_request(&request))
      .unwrap()
      .is_none());
  }

  #[tokio::test]
  async fn test_offline_navigation_gets_root_document() {
    let (policy, _, transport) = setup();
    transport.set_offline(true);

    let response = policy
      .handle(&FetchRequest::navigate(url("/patients")))
      .await
      .unwrap();
    assert_eq!(response.source, CacheSource::Offline);
    assert_eq!(response.body, b"<html>shell</html>".to_vec());
  }

  #[tokio::test]
  async fn test_offline_asset_request_fails() {
    let (policy, _, transport) = setup();
    transport.set_offline(true);

    let err = policy
      .handle(&FetchRequest::get(url("/static/css/main.css")))
      .await
      .unwrap_err();
    assert!(err.is_network());
  }

  #[tokio::test]
  async fn test_offline_navigation_without_root_document_fails() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage.install_generation(GENERATION, &[]).unwrap();
    let transport = ScriptedTransport::new();
    transport.set_offline(true);
    let policy = FetchPolicy::new(
      storage,
      transport,
      ActiveGeneration::new(Some(GENERATION.to_string())),
      "/api/",
      url("/"),
    );

    let err = policy
      .handle(&FetchRequest::navigate(url("/dashboard")))
      .await
      .unwrap_err();
    assert!(err.is_network());
  }

  #[tokio::test]
  async fn test_without_active_generation_nothing_is_stored() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage.install_generation(GENERATION, &[]).unwrap();
    let transport = ScriptedTransport::new();
    transport.respond("GET /api/patients", 200, "[]");
    let policy = FetchPolicy::new(
      storage.clone(),
      transport,
      ActiveGeneration::default(),
      "/api/",
      url("/"),
    );

    let request = FetchRequest::get(url("/api/patients"));
    policy.handle(&request).await.unwrap();
    assert!(storage
      .get(GENERATION, &RequestKey::for_request(&request))
      .unwrap()
      .is_none());
  }
}
