//! HTTP transport abstraction and the reqwest-backed implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

/// Default per-request timeout for [`ReqwestTransport`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully resolved request, ready to be sent.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub headers: HeaderMap,
  pub body: Option<Bytes>,
}

/// Status, headers and body of a completed exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
  status: StatusCode,
  headers: HeaderMap,
  body: Bytes,
}

impl RawResponse {
  pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
    Self {
      status,
      headers,
      body: body.into(),
    }
  }

  pub fn status(&self) -> StatusCode {
    self.status
  }

  pub fn headers(&self) -> &HeaderMap {
    &self.headers
  }

  pub fn body(&self) -> &Bytes {
    &self.body
  }

  pub fn into_body(self) -> Bytes {
    self.body
  }

  /// Body as UTF-8 text, with invalid sequences replaced.
  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }

  /// Decode the body as JSON.
  pub fn json<T: DeserializeOwned>(&self) -> crate::Result<T> {
    serde_json::from_slice(&self.body).map_err(crate::Error::Decode)
  }
}

/// Coarse classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
  Timeout,
  /// DNS resolution, TCP connect or TLS handshake failed
  Connect,
  Other,
}

/// A request that never produced an HTTP response.
#[derive(Debug, Error)]
#[error("transport error ({kind:?}): {message}")]
pub struct TransportError {
  kind: TransportErrorKind,
  message: String,
  #[source]
  source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
  pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
      source: None,
    }
  }

  pub fn kind(&self) -> TransportErrorKind {
    self.kind
  }

  pub fn is_timeout(&self) -> bool {
    self.kind == TransportErrorKind::Timeout
  }
}

impl From<reqwest::Error> for TransportError {
  fn from(err: reqwest::Error) -> Self {
    let kind = if err.is_timeout() {
      TransportErrorKind::Timeout
    } else if err.is_connect() {
      TransportErrorKind::Connect
    } else {
      TransportErrorKind::Other
    };

    Self {
      kind,
      message: format!("{:#}", err),
      source: Some(Box::new(err)),
    }
  }
}

/// Sends requests over the network.
///
/// Implementations own timeouts. They must not inspect the status code:
/// a 404 or 500 is a successful exchange at this level.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn request(&self, request: Request) -> Result<RawResponse, TransportError>;
}

/// Transport backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  /// Build a transport with the given per-request timeout.
  pub fn new(timeout: Duration) -> Result<Self, TransportError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client })
  }

  /// Wrap an already configured client.
  pub fn with_client(client: reqwest::Client) -> Self {
    Self { client }
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn request(&self, request: Request) -> Result<RawResponse, TransportError> {
    let mut builder = self
      .client
      .request(request.method, request.url)
      .headers(request.headers);

    if let Some(body) = request.body {
      builder = builder.body(body);
    }

    let response = builder.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;

    Ok(RawResponse::new(status, headers, body))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use httpmock::prelude::*;
  use reqwest::header::{HeaderValue, CONTENT_TYPE};
  use reqwest::Method;

  fn request(method: Method, url: &str, body: Option<&'static str>) -> Request {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Request {
      method,
      url: Url::parse(url).unwrap(),
      headers,
      body: body.map(|b| Bytes::from_static(b.as_bytes())),
    }
  }

  #[tokio::test]
  async fn test_get_returns_status_and_body() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when.method(GET).path("/items/1");
        then
          .status(200)
          .header("content-type", "application/json")
          .body(r#"{"id":1}"#);
      })
      .await;

    let transport = ReqwestTransport::new(DEFAULT_TIMEOUT).unwrap();
    let response = transport
      .request(request(Method::GET, &server.url("/items/1"), None))
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text(), r#"{"id":1}"#);
    assert_eq!(
      response.headers().get("content-type").unwrap(),
      "application/json"
    );
  }

  #[tokio::test]
  async fn test_error_status_is_not_a_transport_error() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(DELETE).path("/items/1");
        then.status(500).body("boom");
      })
      .await;

    let transport = ReqwestTransport::new(DEFAULT_TIMEOUT).unwrap();
    let response = transport
      .request(request(Method::DELETE, &server.url("/items/1"), None))
      .await
      .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "boom");
  }

  #[tokio::test]
  async fn test_body_and_headers_are_sent() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when
          .method(POST)
          .path("/items")
          .header("content-type", "application/json")
          .body(r#"{"name":"a"}"#);
        then.status(201);
      })
      .await;

    let transport = ReqwestTransport::new(DEFAULT_TIMEOUT).unwrap();
    let response = transport
      .request(request(
        Method::POST,
        &server.url("/items"),
        Some(r#"{"name":"a"}"#),
      ))
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(response.status(), StatusCode::CREATED);
  }

  #[tokio::test]
  async fn test_connection_refused_is_transport_error() {
    // Grab a free port, then close it so nothing is listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
    let err = transport
      .request(request(
        Method::GET,
        &format!("http://127.0.0.1:{}/items", port),
        None,
      ))
      .await
      .unwrap_err();

    assert_eq!(err.kind(), TransportErrorKind::Connect);
  }

  #[test]
  fn test_raw_response_json_decode_failure() {
    let response = RawResponse::new(StatusCode::OK, HeaderMap::new(), "not json");
    let err = response.json::<serde_json::Value>().unwrap_err();
    assert!(matches!(err, crate::Error::Decode(_)));
  }
}
