//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::traits::{CachedEntry, CachedResponse, RequestKey};

/// Persisted worker registration: which generation serves traffic and which
/// one is installed but not yet activated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
  pub active: Option<String>,
  pub waiting: Option<String>,
}

/// Trait for cache storage backends.
///
/// A backend holds any number of named generations, each a map from
/// [`RequestKey`] to [`CachedResponse`]. Which generation is reachable by the
/// fetch policy is decided by the lifecycle controller, not by the store.
pub trait CacheStorage: Send + Sync {
  /// Names of all existing generations, oldest first.
  fn generations(&self) -> Result<Vec<String>>;

  fn has_generation(&self, name: &str) -> Result<bool>;

  /// Create `name` (if missing) and store all entries in one transaction.
  fn install_generation(&self, name: &str, entries: &[(RequestKey, CachedResponse)])
    -> Result<()>;

  /// Delete a generation and all of its entries. Returns whether it existed.
  fn delete_generation(&self, name: &str) -> Result<bool>;

  /// Store a response, replacing any prior entry for the key.
  /// Returns false when the generation does not exist (nothing is written).
  fn put(&self, generation: &str, key: &RequestKey, response: &CachedResponse) -> Result<bool>;

  /// Look up a key in a generation.
  fn get(&self, generation: &str, key: &RequestKey) -> Result<Option<CachedEntry>>;

  fn registration(&self) -> Result<Registration>;

  fn set_registration(&self, registration: &Registration) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn generations(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }

  fn has_generation(&self, _name: &str) -> Result<bool> {
    Ok(false)
  }

  fn install_generation(
    &self,
    _name: &str,
    _entries: &[(RequestKey, CachedResponse)],
  ) -> Result<()> {
    Ok(()) // Discard
  }

  fn delete_generation(&self, _name: &str) -> Result<bool> {
    Ok(false)
  }

  fn put(&self, _generation: &str, _key: &RequestKey, _response: &CachedResponse) -> Result<bool> {
    Ok(false) // Discard
  }

  fn get(&self, _generation: &str, _key: &RequestKey) -> Result<Option<CachedEntry>> {
    Ok(None) // Always miss
  }

  fn registration(&self) -> Result<Registration> {
    Ok(Registration::default())
  }

  fn set_registration(&self, _registration: &Registration) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`, or at the default
  /// location when no path is given.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database (nothing survives the process).
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("ward-tracker").join("cache.db"))
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .conn()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One row per cache generation (e.g. "ward-tracker-v1.0.0")
CREATE TABLE IF NOT EXISTS cache_generations (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses, keyed by hashed (method, url)
CREATE TABLE IF NOT EXISTS cache_entries (
    generation TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (generation, key_hash)
);

-- Single-row worker registration
CREATE TABLE IF NOT EXISTS registration (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    active TEXT,
    waiting TEXT
);
"#;

impl CacheStorage for SqliteStorage {
  fn generations(&self) -> Result<Vec<String>> {
    let conn = self.conn()?;
    let mut stmt = conn
      .prepare("SELECT name FROM cache_generations ORDER BY created_at, name")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list generations: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read generation name: {}", e))?;

    Ok(names)
  }

  fn has_generation(&self, name: &str) -> Result<bool> {
    let conn = self.conn()?;
    let found: Option<i64> = conn
      .query_row(
        "SELECT 1 FROM cache_generations WHERE name = ?",
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up generation {}: {}", name, e))?;

    Ok(found.is_some())
  }

  fn install_generation(
    &self,
    name: &str,
    entries: &[(RequestKey, CachedResponse)],
  ) -> Result<()> {
    let mut conn = self.conn()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT OR IGNORE INTO cache_generations (name, created_at) VALUES (?, datetime('now'))",
      params![name],
    )
    .map_err(|e| eyre!("Failed to create generation {}: {}", name, e))?;

    for (key, response) in entries {
      let headers = serde_json::to_string(&response.headers)
        .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

      tx.execute(
        "INSERT OR REPLACE INTO cache_entries
           (generation, key_hash, method, url, status, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          name,
          key.cache_hash(),
          key.method(),
          key.url(),
          response.status,
          headers,
          response.body
        ],
      )
      .map_err(|e| eyre!("Failed to store {}: {}", key, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn delete_generation(&self, name: &str) -> Result<bool> {
    let mut conn = self.conn()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM cache_entries WHERE generation = ?",
      params![name],
    )
    .map_err(|e| eyre!("Failed to delete entries of {}: {}", name, e))?;

    let deleted = tx
      .execute(
        "DELETE FROM cache_generations WHERE name = ?",
        params![name],
      )
      .map_err(|e| eyre!("Failed to delete generation {}: {}", name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(deleted > 0)
  }

  fn put(&self, generation: &str, key: &RequestKey, response: &CachedResponse) -> Result<bool> {
    let conn = self.conn()?;
    let headers = serde_json::to_string(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    // Never resurrect a generation that was deleted underneath us
    let written = conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries
           (generation, key_hash, method, url, status, headers, body, cached_at)
         SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now')
         WHERE EXISTS (SELECT 1 FROM cache_generations WHERE name = ?1)",
        params![
          generation,
          key.cache_hash(),
          key.method(),
          key.url(),
          response.status,
          headers,
          response.body
        ],
      )
      .map_err(|e| eyre!("Failed to store {}: {}", key, e))?;

    Ok(written > 0)
  }

  fn get(&self, generation: &str, key: &RequestKey) -> Result<Option<CachedEntry>> {
    let conn = self.conn()?;
    let row: Option<(u16, String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT status, headers, body, cached_at FROM cache_entries
         WHERE generation = ? AND key_hash = ?",
        params![generation, key.cache_hash()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", key, e))?;

    match row {
      Some((status, headers, body, cached_at_str)) => {
        let headers: Vec<(String, String)> = serde_json::from_str(&headers)
          .map_err(|e| eyre!("Failed to deserialize headers: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedEntry {
          response: CachedResponse {
            status,
            headers,
            body,
          },
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn registration(&self) -> Result<Registration> {
    let conn = self.conn()?;
    let row: Option<(Option<String>, Option<String>)> = conn
      .query_row(
        "SELECT active, waiting FROM registration WHERE id = 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read registration: {}", e))?;

    Ok(
      row
        .map(|(active, waiting)| Registration { active, waiting })
        .unwrap_or_default(),
    )
  }

  fn set_registration(&self, registration: &Registration) -> Result<()> {
    self
      .conn()?
      .execute(
        "INSERT OR REPLACE INTO registration (id, active, waiting) VALUES (1, ?, ?)",
        params![registration.active, registration.waiting],
      )
      .map_err(|e| eyre!("Failed to write registration: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
