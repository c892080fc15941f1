//! Error types shared by the worker, the API client and the synchronizer.

use thiserror::Error;

/// Failures surfaced by the request interceptor.
///
/// A cache miss is not an error at this level: the fetch policy falls back to
/// the network (or the other way round) and only the final failure is reported.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// Transport-level failure (offline, DNS, connection refused, timeout)
  #[error("network request to {url} failed: {reason}")]
  Network { url: String, reason: String },

  /// A manifest entry could not be fetched during install
  #[error("failed to pre-cache {url}: {reason}")]
  ManifestPopulation { url: String, reason: String },

  #[error("cache storage error: {0}")]
  Storage(String),

  /// The worker task is gone or dropped the reply
  #[error("request interceptor is not running")]
  WorkerUnavailable,
}

impl FetchError {
  pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
    Self::Network {
      url: url.into(),
      reason: reason.to_string(),
    }
  }

  #[cfg(test)]
  pub fn is_network(&self) -> bool {
    matches!(self, Self::Network { .. })
  }
}

/// Client-side conversion failures for form input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
  #[error("{0} is required")]
  Missing(&'static str),

  #[error("{field} must be a number (got '{value}')")]
  InvalidNumber { field: &'static str, value: String },

  #[error("{field} must be a date in YYYY-MM-DD form (got '{value}')")]
  InvalidDate { field: &'static str, value: String },

  #[error("{field} must be a date and time in YYYY-MM-DDTHH:MM form (got '{value}')")]
  InvalidDateTime { field: &'static str, value: String },

  #[error("{field} has an unknown value '{value}'")]
  InvalidChoice { field: &'static str, value: String },
}

impl FormError {
  /// Label of the offending field
  pub fn field(&self) -> &'static str {
    match self {
      FormError::Missing(field) => field,
      FormError::InvalidNumber { field, .. }
      | FormError::InvalidDate { field, .. }
      | FormError::InvalidDateTime { field, .. }
      | FormError::InvalidChoice { field, .. } => field,
    }
  }
}

/// Failures of a typed API call.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  /// The server answered with a non-success status (validation failure,
  /// duplicate id, missing record)
  #[error("server rejected the request ({status}): {detail}")]
  Rejected { status: u16, detail: String },

  #[error("invalid JSON: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("invalid URL: {0}")]
  Url(#[from] url::ParseError),

  #[error(transparent)]
  Form(#[from] FormError),
}
