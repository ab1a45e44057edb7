//! Cache storage trait and SQLite implementation.

use bytes::Bytes;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::key::ResourceKey;

/// A single cached response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
  /// Raw response body as received from the server
  pub data: Bytes,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
  /// When the entry stops being fresh
  pub expires_at: DateTime<Utc>,
}

impl CachedEntry {
  pub fn new(data: impl Into<Bytes>, ttl: Duration) -> Self {
    let cached_at = Utc::now();
    Self {
      data: data.into(),
      cached_at,
      expires_at: cached_at + ttl,
    }
  }

  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    now > self.expires_at
  }
}

/// Trait for cache storage backends.
///
/// Lookups and writes are best effort: a backend that fails to read reports
/// a miss, and a backend that fails to write logs the failure and carries
/// on. Callers never see a cache error from these three methods.
pub trait CacheStore: Send + Sync {
  /// Get the entry for a key, fresh or not.
  fn get(&self, key: &ResourceKey) -> Option<CachedEntry>;

  /// Whether the entry has passed its expiry. Missing entries are expired.
  fn is_expired(&self, key: &ResourceKey) -> bool;

  /// Store a body under a key, replacing any previous entry.
  fn put(&self, key: &ResourceKey, data: &[u8], ttl: Duration);

  /// Remove every expired entry. Returns the number removed.
  fn empty_expired(&self) -> Result<usize>;

  /// Remove every entry. Returns the number removed.
  fn empty_all(&self) -> Result<usize>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the cache database at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open (or create) the cache database at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// A store that lives only as long as this value.
  pub fn in_memory() -> Result<Self> {
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

    Ok(data_dir.join("restbarrel").join("cache.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  fn try_get(&self, key: &ResourceKey) -> Result<Option<CachedEntry>> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, String, String)> = conn
      .query_row(
        "SELECT data, cached_at, expires_at FROM resource_cache WHERE cache_key = ?",
        params![key.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry: {}", e))?;

    match row {
      Some((data, cached_at, expires_at)) => Ok(Some(CachedEntry {
        data: Bytes::from(data),
        cached_at: parse_datetime(&cached_at)?,
        expires_at: parse_datetime(&expires_at)?,
      })),
      None => Ok(None),
    }
  }

  fn try_expires_at(&self, key: &ResourceKey) -> Result<Option<DateTime<Utc>>> {
    let conn = self.lock()?;

    let expires_at: Option<String> = conn
      .query_row(
        "SELECT expires_at FROM resource_cache WHERE cache_key = ?",
        params![key.as_str()],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache expiry: {}", e))?;

    expires_at.as_deref().map(parse_datetime).transpose()
  }

  fn try_put(&self, key: &ResourceKey, data: &[u8], ttl: Duration) -> Result<()> {
    let conn = self.lock()?;
    let cached_at = Utc::now();
    let expires_at = cached_at + ttl;

    conn
      .execute(
        "INSERT OR REPLACE INTO resource_cache (cache_key, resource, data, cached_at, expires_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
          key.as_str(),
          key.canonical(),
          data,
          format_datetime(cached_at),
          format_datetime(expires_at)
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn drop_schema(&self) {
    self
      .lock()
      .unwrap()
      .execute_batch("DROP TABLE resource_cache")
      .unwrap();
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Response bodies keyed by canonical URL hash
CREATE TABLE IF NOT EXISTS resource_cache (
    cache_key TEXT PRIMARY KEY,
    resource TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_resource_cache_expires
    ON resource_cache(expires_at);
"#;

impl CacheStore for SqliteStore {
  fn get(&self, key: &ResourceKey) -> Option<CachedEntry> {
    match self.try_get(key) {
      Ok(entry) => entry,
      Err(e) => {
        warn!(resource = %key, error = %e, "cache read failed, treating as miss");
        None
      }
    }
  }

  fn is_expired(&self, key: &ResourceKey) -> bool {
    match self.try_expires_at(key) {
      Ok(Some(expires_at)) => Utc::now() > expires_at,
      Ok(None) => true,
      Err(e) => {
        warn!(resource = %key, error = %e, "cache expiry check failed");
        true
      }
    }
  }

  fn put(&self, key: &ResourceKey, data: &[u8], ttl: Duration) {
    match self.try_put(key, data, ttl) {
      Ok(()) => debug!(resource = %key, bytes = data.len(), "cached response"),
      Err(e) => warn!(resource = %key, error = %e, "cache write failed, ignoring"),
    }
  }

  fn empty_expired(&self) -> Result<usize> {
    let conn = self.lock()?;
    conn
      .execute(
        "DELETE FROM resource_cache WHERE expires_at < ?",
        params![format_datetime(Utc::now())],
      )
      .map_err(|e| eyre!("Failed to purge expired entries: {}", e))
  }

  fn empty_all(&self) -> Result<usize> {
    let conn = self.lock()?;
    conn
      .execute("DELETE FROM resource_cache", [])
      .map_err(|e| eyre!("Failed to purge cache: {}", e))
  }
}

/// Fixed-width UTC timestamps so text comparison in SQL matches time order.
fn format_datetime(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
