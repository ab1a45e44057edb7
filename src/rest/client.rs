//! REST client with read-through caching and offline fallback.

use bytes::Bytes;
use chrono::Duration;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::cache::{CacheStore, Fetched, ResourceKey};
use crate::connectivity::Connectivity;
use crate::error::{Error, Result};
use crate::transport::{RawResponse, Request, Transport};

use super::builder::RestClientBuilder;

/// Cache duration used by [`RestClient::fetch_default`].
pub const DEFAULT_CACHE_HOURS: i64 = 24;

/// Durations are clamped to a century so expiry timestamps stay in range.
const MAX_CACHE_HOURS: i64 = 24 * 365 * 100;

/// JSON REST client with transparent caching support.
///
/// GET requests go through the cache and the connectivity probe; POST, PUT
/// and DELETE always hit the network and never touch the cache.
///
/// Concurrent fetches of the same resource are not coalesced. Both may miss
/// the cache and both write it; the last write wins.
#[derive(Clone)]
pub struct RestClient {
  pub(super) base_url: Url,
  pub(super) headers: HeaderMap,
  pub(super) transport: Arc<dyn Transport>,
  pub(super) connectivity: Arc<dyn Connectivity>,
  pub(super) cache: Option<Arc<dyn CacheStore>>,
}

impl RestClient {
  pub fn builder(base_url: impl Into<String>) -> RestClientBuilder {
    RestClientBuilder::new(base_url)
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// The cache store, if caching is enabled.
  pub fn cache(&self) -> Option<&Arc<dyn CacheStore>> {
    self.cache.as_ref()
  }

  /// Fetch and decode a resource, caching it for `cache_hours`.
  ///
  /// `cache_hours <= 0` skips the fresh-cache lookup and the cache write,
  /// but a cached copy is still served when the network is unreachable.
  pub async fn fetch<T: DeserializeOwned>(&self, resource: &str, cache_hours: i64) -> Result<T> {
    Ok(self.fetch_with_source(resource, cache_hours).await?.data)
  }

  /// [`fetch`](Self::fetch) with the default 24 hour cache duration.
  pub async fn fetch_default<T: DeserializeOwned>(&self, resource: &str) -> Result<T> {
    self.fetch(resource, DEFAULT_CACHE_HOURS).await
  }

  /// Like [`fetch`](Self::fetch), also reporting where the data came from.
  pub async fn fetch_with_source<T: DeserializeOwned>(
    &self,
    resource: &str,
    cache_hours: i64,
  ) -> Result<Fetched<T>> {
    self
      .resolve(resource, cache_hours)
      .await?
      .try_map(|body| serde_json::from_slice(&body).map_err(Error::Decode))
  }

  /// Resolve a GET into raw body bytes from the cache or the network.
  ///
  /// 1. Fresh cache entry and `cache_hours > 0`: serve it
  /// 2. Offline: serve any cached entry, otherwise fail
  /// 3. Online: fetch, then cache the body if `cache_hours > 0`
  async fn resolve(&self, resource: &str, cache_hours: i64) -> Result<Fetched<Bytes>> {
    let key = ResourceKey::resolve(&self.base_url, resource)?;

    if let Some(cache) = &self.cache {
      let cached = cache.get(&key);

      if cache_hours > 0 {
        if let Some(entry) = &cached {
          if !cache.is_expired(&key) {
            debug!(resource = %key, "serving fresh cache entry");
            return Ok(Fetched::from_cache(entry.data.clone(), entry.cached_at));
          }
        }
      }

      if !self.connectivity.has_internet().await {
        return match cached {
          Some(entry) => {
            info!(resource = %key, cached_at = %entry.cached_at, "offline, serving cached data");
            Ok(Fetched::offline(entry.data, entry.cached_at))
          }
          None => Err(Error::NoConnectivity),
        };
      }
    } else if !self.connectivity.has_internet().await {
      return Err(Error::NoConnectivity);
    }

    let body = self
      .send(Method::GET, key.url().clone(), None)
      .await?
      .into_body();

    if cache_hours > 0 {
      if let Some(cache) = &self.cache {
        let ttl = Duration::hours(cache_hours.min(MAX_CACHE_HOURS));
        cache.put(&key, &body, ttl);
      }
    }

    Ok(Fetched::from_network(body))
  }

  /// POST `payload` as JSON.
  pub async fn create<P: Serialize + ?Sized>(
    &self,
    resource: &str,
    payload: &P,
  ) -> Result<RawResponse> {
    let body = encode(payload)?;
    let url = self.url_for(resource)?;
    self.send(Method::POST, url, Some(body)).await
  }

  /// PUT `payload` as JSON.
  pub async fn replace<P: Serialize + ?Sized>(
    &self,
    resource: &str,
    payload: &P,
  ) -> Result<RawResponse> {
    let body = encode(payload)?;
    let url = self.url_for(resource)?;
    self.send(Method::PUT, url, Some(body)).await
  }

  /// DELETE a resource.
  pub async fn remove(&self, resource: &str) -> Result<RawResponse> {
    let url = self.url_for(resource)?;
    self.send(Method::DELETE, url, None).await
  }

  fn url_for(&self, resource: &str) -> Result<Url> {
    self.base_url.join(resource).map_err(|source| Error::InvalidUrl {
      input: resource.to_string(),
      source,
    })
  }

  async fn send(&self, method: Method, url: Url, body: Option<Bytes>) -> Result<RawResponse> {
    let mut headers = self.headers.clone();
    if body.is_some() {
      headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    debug!(%method, %url, "sending request");

    let response = self
      .transport
      .request(Request {
        method,
        url: url.clone(),
        headers,
        body,
      })
      .await?;

    let status = response.status();
    if !status.is_success() {
      return Err(Error::HttpFailure { status, url });
    }

    Ok(response)
  }
}

fn encode<P: Serialize + ?Sized>(payload: &P) -> Result<Bytes> {
  serde_json::to_vec(payload)
    .map(Bytes::from)
    .map_err(Error::Encode)
}
