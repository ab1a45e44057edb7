//! In-process cache store.

use chrono::{Duration, Utc};
use color_eyre::Result;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::key::ResourceKey;
use super::storage::{CacheStore, CachedEntry};

/// Cache store backed by a `HashMap`. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, CachedEntry>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries().is_empty()
  }

  // A panic while holding the lock cannot leave a half-written entry behind.
  fn entries(&self) -> MutexGuard<'_, HashMap<String, CachedEntry>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl CacheStore for MemoryStore {
  fn get(&self, key: &ResourceKey) -> Option<CachedEntry> {
    self.entries().get(key.as_str()).cloned()
  }

  fn is_expired(&self, key: &ResourceKey) -> bool {
    self
      .entries()
      .get(key.as_str())
      .map(|entry| entry.is_expired_at(Utc::now()))
      .unwrap_or(true)
  }

  fn put(&self, key: &ResourceKey, data: &[u8], ttl: Duration) {
    let entry = CachedEntry::new(data.to_vec(), ttl);
    self.entries().insert(key.as_str().to_string(), entry);
  }

  fn empty_expired(&self) -> Result<usize> {
    let now = Utc::now();
    let mut entries = self.entries();
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired_at(now));
    Ok(before - entries.len())
  }

  fn empty_all(&self) -> Result<usize> {
    let mut entries = self.entries();
    let count = entries.len();
    entries.clear();
    Ok(count)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn key(resource: &str) -> ResourceKey {
    ResourceKey::from_url(Url::parse("https://api.example.com/").unwrap().join(resource).unwrap())
  }

  #[test]
  fn test_get_put_expiry() {
    let store = MemoryStore::new();
    let k = key("items/1");

    assert!(store.get(&k).is_none());
    assert!(store.is_expired(&k));

    store.put(&k, b"fresh", Duration::hours(1));
    assert!(!store.is_expired(&k));
    assert_eq!(store.len(), 1);

    store.put(&k, b"stale", Duration::seconds(-1));
    assert!(store.is_expired(&k));
    assert_eq!(&store.get(&k).unwrap().data[..], b"stale");
  }

  #[test]
  fn test_purge() {
    let store = MemoryStore::new();
    store.put(&key("a"), b"1", Duration::seconds(-1));
    store.put(&key("b"), b"2", Duration::hours(1));

    assert_eq!(store.empty_expired().unwrap(), 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.empty_all().unwrap(), 1);
    assert!(store.is_empty());
  }
}
