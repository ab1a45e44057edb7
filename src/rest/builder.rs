//! Construction of [`RestClient`] from code or from a config file.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::cache::{CacheStore, SqliteStore};
use crate::config::Config;
use crate::connectivity::{Connectivity, TcpProbe, DEFAULT_PROBE_TIMEOUT};
use crate::error::{Error, Result};
use crate::transport::{ReqwestTransport, Transport, DEFAULT_TIMEOUT};

use super::client::RestClient;

/// Builder for [`RestClient`].
///
/// Base URL and headers are fixed once `build` returns. Without an explicit
/// transport or probe, a reqwest transport and a TCP probe against the base
/// URL's host are used. Without a cache store, every fetch goes to the
/// network.
pub struct RestClientBuilder {
  base_url: String,
  headers: Vec<(String, String)>,
  transport: Option<Arc<dyn Transport>>,
  connectivity: Option<Arc<dyn Connectivity>>,
  cache: Option<Arc<dyn CacheStore>>,
  timeout: Duration,
  probe_timeout: Duration,
}

impl RestClientBuilder {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      headers: Vec::new(),
      transport: None,
      connectivity: None,
      cache: None,
      timeout: DEFAULT_TIMEOUT,
      probe_timeout: DEFAULT_PROBE_TIMEOUT,
    }
  }

  /// Builder preconfigured from a config file.
  ///
  /// Opens the SQLite cache when caching is enabled.
  pub fn from_config(config: &Config) -> color_eyre::Result<Self> {
    let mut builder = Self::new(config.api.base_url.clone())
      .headers(config.static_headers()?)
      .timeout(config.request_timeout())
      .probe_timeout(config.probe_timeout());

    if let Some(target) = &config.connectivity.probe {
      builder = builder.connectivity(Arc::new(TcpProbe::new(
        target.clone(),
        config.probe_timeout(),
      )));
    }

    if config.cache.enabled {
      let store = match &config.cache.path {
        Some(path) => SqliteStore::open_at(path)?,
        None => SqliteStore::open()?,
      };
      builder = builder.cache(Arc::new(store));
    }

    Ok(builder)
  }

  /// Add a header sent with every request. `Accept` is always
  /// `application/json` and cannot be overridden.
  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn headers<I, K, V>(mut self, headers: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    self
      .headers
      .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
    self
  }

  pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
    self.transport = Some(transport);
    self
  }

  pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
    self.connectivity = Some(connectivity);
    self
  }

  pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
    self.cache = Some(cache);
    self
  }

  pub fn without_cache(mut self) -> Self {
    self.cache = None;
    self
  }

  /// Request timeout for the default transport.
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Connect timeout for the default connectivity probe.
  pub fn probe_timeout(mut self, timeout: Duration) -> Self {
    self.probe_timeout = timeout;
    self
  }

  pub fn build(self) -> Result<RestClient> {
    let base_url = parse_base_url(&self.base_url)?;
    let headers = build_headers(&self.headers)?;

    let transport = match self.transport {
      Some(transport) => transport,
      None => Arc::new(ReqwestTransport::new(self.timeout)?),
    };

    let connectivity = match self.connectivity {
      Some(connectivity) => connectivity,
      None => {
        let probe =
          TcpProbe::for_url(&base_url, self.probe_timeout).ok_or_else(|| Error::InvalidUrl {
            input: self.base_url.clone(),
            source: url::ParseError::EmptyHost,
          })?;
        Arc::new(probe)
      }
    };

    Ok(RestClient {
      base_url,
      headers,
      transport,
      connectivity,
      cache: self.cache,
    })
  }
}

fn parse_base_url(input: &str) -> Result<Url> {
  let url = Url::parse(input).map_err(|source| Error::InvalidUrl {
    input: input.to_string(),
    source,
  })?;

  if url.cannot_be_a_base() {
    return Err(Error::InvalidUrl {
      input: input.to_string(),
      source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
    });
  }

  Ok(url)
}

fn build_headers(pairs: &[(String, String)]) -> Result<HeaderMap> {
  let mut headers = HeaderMap::new();

  for (name, value) in pairs {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
      name: name.clone(),
      reason: e.to_string(),
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
      name: name.clone(),
      reason: e.to_string(),
    })?;
    headers.insert(header_name, header_value);
  }

  headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
  Ok(headers)
}
