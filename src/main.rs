mod api;
mod app;
mod cache;
mod commands;
mod config;
mod error;
mod event;
mod logging;
mod query;
mod sync;
#[cfg(test)]
mod testing;
mod ui;
mod worker;

use cache::{ActiveGeneration, CacheStorage, FetchPolicy, NoopStorage, SqliteStorage};
use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use worker::lifecycle::{LifecycleConfig, LifecycleController};
use worker::transport::{HttpTransport, Transport};
use worker::ServiceWorker;

#[derive(Parser, Debug)]
#[command(name = "ward-tracker")]
#[command(about = "A terminal client for the maternity ward patient tracker, usable offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/ward-tracker/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend URL, overrides the config file
  #[arg(short, long)]
  server_url: Option<String>,

  /// Do not persist anything; every request goes to the network
  #[arg(long)]
  no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = logging::init()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(url) = args.server_url {
    config.server.url = url;
  }
  if args.no_cache {
    config.cache.enabled = false;
  }

  let server_url = config.server_url()?;
  info!("Starting against {}", server_url);

  // Cache store; when disabled nothing is stored and nothing is pre-fetched
  let (storage, manifest): (Arc<dyn CacheStorage>, _) = if config.cache.enabled {
    let storage = SqliteStorage::open(config.cache.path.as_deref())?;
    (Arc::new(storage), config.manifest_urls()?)
  } else {
    info!("Cache disabled");
    (Arc::new(NoopStorage), Vec::new())
  };

  let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
  let active = ActiveGeneration::default();
  let lifecycle = LifecycleController::new(
    LifecycleConfig {
      generation: config.cache.generation(),
      manifest,
      fast_activate: config.cache.fast_activate,
    },
    storage.clone(),
    transport.clone(),
    active.clone(),
  );
  let policy = FetchPolicy::new(
    storage,
    transport.clone(),
    active,
    config.cache.api_prefix.clone(),
    server_url.join("/")?,
  );

  let (worker, host_rx) = ServiceWorker::spawn(lifecycle, policy, transport);
  let client = worker.connect()?;
  let api = api::WardClient::new(client, server_url);
  let sync = sync::WardSync::new(api, config.vital_signs_limit);

  // Initialize and run the app
  let mut app = app::App::new(&config, worker, host_rx, sync);
  app.run().await?;

  Ok(())
}
