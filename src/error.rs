//! Error types returned by the REST client.

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::transport::TransportError;

/// Result alias for client operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by `fetch`, `create`, `replace` and `remove`.
///
/// Nothing here is retried by the client. Cache write failures never show up
/// as an `Error`; the cache store logs and drops them.
#[derive(Debug, Error)]
pub enum Error {
  /// No network path and no cached copy to fall back on.
  #[error("no internet connection and no cached data available")]
  NoConnectivity,

  /// The request completed but the server answered with a non-success status.
  #[error("request to {url} failed with status {status}")]
  HttpFailure { status: StatusCode, url: Url },

  /// DNS, TLS, connect or timeout failure from the transport.
  #[error(transparent)]
  Transport(#[from] TransportError),

  /// The response body did not match the requested shape.
  #[error("failed to decode response body: {0}")]
  Decode(#[source] serde_json::Error),

  /// The request payload could not be serialized.
  #[error("failed to encode request body: {0}")]
  Encode(#[source] serde_json::Error),

  /// Blank resource path passed to a fetch.
  #[error("resource path must not be empty")]
  EmptyResource,

  /// Base URL or resource that does not form a valid URL.
  #[error("invalid url '{input}': {source}")]
  InvalidUrl {
    input: String,
    #[source]
    source: url::ParseError,
  },

  /// Static header with an unusable name or value.
  #[error("invalid header '{name}': {reason}")]
  InvalidHeader { name: String, reason: String },
}

impl Error {
  /// HTTP status of an `HttpFailure`, if this is one.
  pub fn status(&self) -> Option<StatusCode> {
    match self {
      Self::HttpFailure { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_no_connectivity(&self) -> bool {
    matches!(self, Self::NoConnectivity)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_only_for_http_failure() {
    let err = Error::HttpFailure {
      status: StatusCode::NOT_FOUND,
      url: Url::parse("https://api.example.com/items/9").unwrap(),
    };
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert!(Error::NoConnectivity.status().is_none());
  }

  #[test]
  fn test_http_failure_message_names_url_and_status() {
    let err = Error::HttpFailure {
      status: StatusCode::BAD_GATEWAY,
      url: Url::parse("https://api.example.com/items").unwrap(),
    };
    let msg = err.to_string();
    assert!(msg.contains("https://api.example.com/items"));
    assert!(msg.contains("502"));
  }
}
