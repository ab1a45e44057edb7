//! Result metadata describing where fetched data came from.

use chrono::{DateTime, Utc};

/// Result from a fetch, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: FetchSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> Fetched<T> {
  /// Fresh data from the network.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: FetchSource::Network,
      cached_at: None,
    }
  }

  /// Cached data that has not expired.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: FetchSource::CacheFresh,
      cached_at: Some(cached_at),
    }
  }

  /// Cached data served because the network is unreachable.
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: FetchSource::Offline,
      cached_at: Some(cached_at),
    }
  }

  /// Replace the payload, keeping the metadata.
  pub(crate) fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Fetched<U>, E> {
    Ok(Fetched {
      data: f(self.data)?,
      source: self.source,
      cached_at: self.cached_at,
    })
  }
}

/// Indicates where fetched data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Offline mode - network unavailable, serving cached data
  Offline,
}
