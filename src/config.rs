use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Custom title for header (defaults to the server host if not set)
  pub title: Option<String>,
  pub server: ServerConfig,
  pub cache: CacheConfig,
  /// Wards offered by the ward filter and the patient form
  pub wards: Vec<String>,
  /// Number of vital sign records fetched per list
  pub vital_signs_limit: u32,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      title: None,
      server: ServerConfig::default(),
      cache: CacheConfig::default(),
      wards: ["1", "2", "3", "4"].iter().map(|w| w.to_string()).collect(),
      vital_signs_limit: 50,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub url: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:8001".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// When false nothing is persisted and every request goes to the network
  pub enabled: bool,
  pub name: String,
  pub version: String,
  /// Paths under this prefix are network-first
  pub api_prefix: String,
  /// Activate a freshly installed generation without waiting for clients to exit
  pub fast_activate: bool,
  /// SQLite file (default: $XDG_DATA_HOME/ward-tracker/cache.db)
  pub path: Option<PathBuf>,
  /// Static assets stored on install, relative to the server URL
  pub manifest: Vec<String>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      name: "ward-tracker".to_string(),
      version: "v1.0.0".to_string(),
      api_prefix: "/api/".to_string(),
      fast_activate: true,
      path: None,
      manifest: ["/", "/static/js/bundle.js", "/static/css/main.css", "/manifest.json"]
        .iter()
        .map(|m| m.to_string())
        .collect(),
    }
  }
}

impl CacheConfig {
  /// Name of the generation this build serves.
  pub fn generation(&self) -> String {
    format!("{}-{}", self.name, self.version)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./ward-tracker.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ward-tracker/config.yaml
  ///
  /// Built-in defaults are used when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("ward-tracker.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("ward-tracker").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let mut config: Self = serde_yaml::from_str(contents)?;
    config.cache.path = config.cache.path.map(expand_home);
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    self.server_url()?;
    if !self.cache.api_prefix.starts_with('/') {
      return Err(eyre!(
        "cache.api_prefix must start with '/': {}",
        self.cache.api_prefix
      ));
    }
    Ok(())
  }

  pub fn server_url(&self) -> Result<Url> {
    Url::parse(&self.server.url).map_err(|e| eyre!("Invalid server URL {}: {}", self.server.url, e))
  }

  /// Absolute URLs of the install manifest.
  pub fn manifest_urls(&self) -> Result<Vec<Url>> {
    let base = self.server_url()?;
    self
      .cache
      .manifest
      .iter()
      .map(|entry| {
        base
          .join(entry)
          .map_err(|e| eyre!("Invalid manifest entry {}: {}", entry, e))
      })
      .collect()
  }

  /// Header title: configured title or the server host.
  pub fn display_title(&self) -> String {
    self.title.clone().unwrap_or_else(|| {
      self
        .server_url()
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| "ward-tracker".to_string())
    })
  }
}

/// Resolve a leading `~` against the home directory.
fn expand_home(path: PathBuf) -> PathBuf {
  let Some(home) = dirs::home_dir() else {
    return path;
  };
  if let Ok(rest) = path.strip_prefix("~") {
    return home.join(rest);
  }
  path
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_file_gives_defaults() {
    let config = Config::parse("{}").unwrap();
    assert_eq!(config.server.url, "http://localhost:8001");
    assert_eq!(config.cache.generation(), "ward-tracker-v1.0.0");
    assert!(config.cache.fast_activate);
    assert_eq!(config.vital_signs_limit, 50);
    assert_eq!(config.wards.len(), 4);
  }

  #[test]
  fn test_partial_override() {
    let config = Config::parse(
      r#"
title: Maternity Ward
server:
  url: http://ward.local:9000
cache:
  version: v2.0.0
  fast_activate: false
  manifest: ["/", "/manifest.json"]
wards: ["A", "B"]
"#,
    )
    .unwrap();

    assert_eq!(config.display_title(), "Maternity Ward");
    assert_eq!(config.cache.generation(), "ward-tracker-v2.0.0");
    assert!(!config.cache.fast_activate);
    assert_eq!(config.cache.api_prefix, "/api/");
    assert_eq!(
      config
        .manifest_urls()
        .unwrap()
        .iter()
        .map(|u| u.as_str())
        .collect::<Vec<_>>(),
      vec!["http://ward.local:9000/", "http://ward.local:9000/manifest.json"]
    );
  }

  #[test]
  fn test_title_defaults_to_host() {
    assert_eq!(Config::default().display_title(), "localhost");
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let mut config = Config::default();
    config.server.url = "not a url".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.cache.api_prefix = "api/".to_string();
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_cache_path_expands_home() {
    let config = Config::parse("cache:\n  path: ~/.local/share/ward-tracker/cache.db").unwrap();
    let path = config.cache.path.unwrap();
    assert!(path.is_absolute());
    assert_eq!(
      path,
      dirs::home_dir()
        .unwrap()
        .join(".local/share/ward-tracker/cache.db")
    );

    let config = Config::parse("cache:\n  path: /var/lib/ward/cache.db").unwrap();
    assert_eq!(config.cache.path, Some(PathBuf::from("/var/lib/ward/cache.db")));
  }

  #[test]
  fn test_missing_explicit_path() {
    assert!(Config::load(Some(Path::new("/nonexistent/ward-tracker.yaml"))).is_err());
  }
}
