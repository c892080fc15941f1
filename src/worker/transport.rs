//! The network boundary: request/response values and the transport trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Serialize;
use url::Url;

use crate::cache::{CacheSource, CachedEntry};
use crate::error::FetchError;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
  /// Data or asset request issued by a view
  #[default]
  Fetch,
  /// Top-level document navigation (eligible for the offline fallback)
  Navigate,
}

/// An outbound HTTP request as seen by the interceptor.
#[derive(Debug, Clone)]
pub struct FetchRequest {
  pub method: Method,
  pub url: Url,
  pub headers: Vec<(String, String)>,
  pub body: Option<Vec<u8>>,
  pub mode: RequestMode,
}

impl FetchRequest {
  pub fn new(method: Method, url: Url) -> Self {
    Self {
      method,
      url,
      headers: Vec::new(),
      body: None,
      mode: RequestMode::Fetch,
    }
  }

  pub fn get(url: Url) -> Self {
    Self::new(Method::GET, url)
  }

  /// Navigation request for a document.
  pub fn navigate(url: Url) -> Self {
    Self {
      mode: RequestMode::Navigate,
      ..Self::get(url)
    }
    .with_header("accept", "text/html")
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }

  /// Request with a JSON body.
  pub fn json<T: Serialize>(method: Method, url: Url, body: &T) -> serde_json::Result<Self> {
    let mut request = Self::new(method, url).with_header("content-type", "application/json");
    request.body = Some(serde_json::to_vec(body)?);
    Ok(request)
  }

  pub fn is_navigation(&self) -> bool {
    self.mode == RequestMode::Navigate
  }
}

/// A resolved response, from the network or from a cache generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  pub source: CacheSource,
  pub cached_at: Option<DateTime<Utc>>,
}

impl FetchResponse {
  pub fn from_network(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
    Self {
      status,
      headers,
      body,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  pub fn from_cache(entry: CachedEntry, source: CacheSource) -> Self {
    Self {
      status: entry.response.status,
      headers: entry.response.headers,
      body: entry.response.body,
      source,
      cached_at: Some(entry.cached_at),
    }
  }

  /// 2xx status
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Something that can put a request on the wire.
///
/// A rejected future means the transport failed (no response at all); HTTP
/// error statuses are successful resolutions.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> color_eyre::Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("ward-tracker/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| color_eyre::eyre::eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
    let mut builder = self
      .client
      .request(request.method.clone(), request.url.clone());
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &request.body {
      builder = builder.body(body.clone());
    }

    let response = builder
      .send()
      .await
      .map_err(|e| FetchError::network(request.url.as_str(), e))?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::network(request.url.as_str(), e))?;

    Ok(FetchResponse::from_network(status, headers, body.to_vec()))
  }
}
