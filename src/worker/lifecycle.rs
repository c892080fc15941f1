//! Install/activate/update of cache generations.

use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use super::transport::{FetchRequest, Transport};
use crate::cache::{ActiveGeneration, CacheStorage, CachedResponse, Registration, RequestKey};
use crate::error::FetchError;

/// Construction-time settings of the controller.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
  /// Version identifier of the generation this build serves
  pub generation: String,
  /// Static assets stored at install time
  pub manifest: Vec<Url>,
  /// Activate right after install instead of waiting for consumers to exit
  pub fast_activate: bool,
}

/// What the worker has to do at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
  /// The current generation is already active
  Resume,
  /// Installed by an earlier run and left waiting
  ActivateWaiting,
  /// The current generation does not exist yet
  Install,
}

/// Result of a successful install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
  /// Fast-activate: pre-empt whatever is active now
  Activate,
  /// Recorded as waiting while an older generation keeps serving
  Wait,
}

/// Owns creation and retirement of cache generations.
///
/// At most one generation is reachable through the [`ActiveGeneration`]
/// pointer; switching it happens under the pointer's write lock.
pub struct LifecycleController {
  config: LifecycleConfig,
  storage: Arc<dyn CacheStorage>,
  transport: Arc<dyn Transport>,
  active: ActiveGeneration,
}

impl LifecycleController {
  pub fn new(
    config: LifecycleConfig,
    storage: Arc<dyn CacheStorage>,
    transport: Arc<dyn Transport>,
    active: ActiveGeneration,
  ) -> Self {
    Self {
      config,
      storage,
      transport,
      active,
    }
  }

  pub fn generation(&self) -> &str {
    &self.config.generation
  }

  /// Generation requests currently resolve against.
  pub async fn serving(&self) -> Option<String> {
    self.active.current().await
  }

  /// Restore the persisted registration and decide what to do next.
  ///
  /// Until the current generation activates, the previously active one (if it
  /// still exists) keeps serving.
  pub async fn register(&self) -> Result<Startup, FetchError> {
    let registration = self.storage.registration().map_err(storage_error)?;
    let current = self.generation();

    let previous = match registration.active {
      Some(name) if self.storage.has_generation(&name).map_err(storage_error)? => Some(name),
      _ => None,
    };
    let resumed = previous.as_deref() == Some(current);
    *self.active.write().await = previous;

    if resumed {
      info!("Resuming cache generation {}", current);
      return Ok(Startup::Resume);
    }

    let waiting = registration.waiting.as_deref() == Some(current)
      && self.storage.has_generation(current).map_err(storage_error)?;
    if waiting {
      Ok(Startup::ActivateWaiting)
    } else {
      Ok(Startup::Install)
    }
  }

  /// Fetch the whole manifest and store it as the current generation.
  ///
  /// All-or-nothing: the generation is only created once every entry has been
  /// fetched with a success status.
  pub async fn install(&self) -> Result<InstallOutcome, FetchError> {
    let generation = self.generation();
    info!(
      "Installing cache generation {} ({} assets)",
      generation,
      self.config.manifest.len()
    );

    let fetches = self.config.manifest.iter().map(|url| self.precache(url));
    let entries = futures::future::try_join_all(fetches).await.map_err(|e| {
      warn!("Install of {} failed: {}", generation, e);
      e
    })?;

    self
      .storage
      .install_generation(generation, &entries)
      .map_err(storage_error)?;

    // Nothing to wait for when no older generation is serving
    if self.config.fast_activate || self.active.current().await.is_none() {
      return Ok(InstallOutcome::Activate);
    }

    let mut registration = self.storage.registration().map_err(storage_error)?;
    registration.waiting = Some(generation.to_string());
    self
      .storage
      .set_registration(&registration)
      .map_err(storage_error)?;
    info!("Cache generation {} installed and waiting", generation);
    Ok(InstallOutcome::Wait)
  }

  async fn precache(&self, url: &Url) -> Result<(RequestKey, CachedResponse), FetchError> {
    let request = FetchRequest::get(url.clone());
    let manifest_error = |reason: String| FetchError::ManifestPopulation {
      url: url.to_string(),
      reason,
    };

    let response = self
      .transport
      .send(&request)
      .await
      .map_err(|e| manifest_error(e.to_string()))?;
    if !response.is_success() {
      return Err(manifest_error(format!("status {}", response.status)));
    }

    Ok((RequestKey::for_request(&request), CachedResponse::from(&response)))
  }

  /// Delete every other generation, then point traffic at the current one.
  ///
  /// Returns the names of the deleted generations.
  pub async fn activate(&self) -> Result<Vec<String>, FetchError> {
    let current = self.generation().to_string();
    let mut active = self.active.write().await;

    let mut deleted = Vec::new();
    for name in self.storage.generations().map_err(storage_error)? {
      if name != current && self.storage.delete_generation(&name).map_err(storage_error)? {
        info!("Deleted superseded cache generation {}", name);
        deleted.push(name);
      }
    }

    self
      .storage
      .set_registration(&Registration {
        active: Some(current.clone()),
        waiting: None,
      })
      .map_err(storage_error)?;
    *active = Some(current.clone());

    info!("Cache generation {} activated", current);
    Ok(deleted)
  }
}

fn storage_error(e: color_eyre::Report) -> FetchError {
  FetchError::Storage(e.to_string())
}
