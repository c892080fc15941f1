//! Core types for the response cache.

use chrono::{DateTime, Utc};
use reqwest::Method;
use sha2::{Digest, Sha256};
use url::Url;

use crate::worker::transport::{FetchRequest, FetchResponse};

/// Normalized (method, URL) pair used to index a cache generation.
///
/// The URL fragment is dropped; everything else, including query parameter
/// order, is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
  method: String,
  url: String,
}

impl RequestKey {
  pub fn new(method: &Method, url: &Url) -> Self {
    let mut url = url.clone();
    url.set_fragment(None);
    Self {
      method: method.as_str().to_ascii_uppercase(),
      url: url.to_string(),
    }
  }

  /// Key for a GET of `url`.
  pub fn get(url: &Url) -> Self {
    Self::new(&Method::GET, url)
  }

  pub fn for_request(request: &FetchRequest) -> Self {
    Self::new(&request.method, &request.url)
  }

  pub fn method(&self) -> &str {
    &self.method
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  /// SHA256 of the key for stable, fixed-length storage keys.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl std::fmt::Display for RequestKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} {}", self.method, self.url)
  }
}

/// Immutable snapshot of a response as stored in a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl From<&FetchResponse> for CachedResponse {
  fn from(response: &FetchResponse) -> Self {
    Self {
      status: response.status,
      headers: response.headers.clone(),
      body: response.body.clone(),
    }
  }
}

/// A stored response together with the time it was written.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub response: CachedResponse,
  pub cached_at: DateTime<Utc>,
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheSource {
  /// Fresh data from network
  #[default]
  Network,
  /// Cache hit on the cache-first path
  Cache,
  /// Network unavailable, serving the last stored response
  Offline,
}

/// Decoded data together with metadata about its source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Wrap data decoded from `response`, carrying over its source.
  pub fn from_response(data: T, response: &FetchResponse) -> Self {
    Self {
      data,
      source: response.source,
      cached_at: response.cached_at,
    }
  }

  pub fn is_offline(&self) -> bool {
    self.source == CacheSource::Offline
  }
}
