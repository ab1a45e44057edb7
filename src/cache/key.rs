//! Cache keys for resolved resource URLs.

use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

use crate::error::{Error, Result};

/// Identity of a requested resource, derived from the URL it resolves to.
///
/// The resource is joined onto the base URL first, so `items/1` and
/// `/items/1` only share a key when they name the same URL. After that,
/// only parts that do not change the response are canonicalized:
///
/// - any `#fragment` is dropped
/// - empty query pairs are dropped
/// - query pairs are stably sorted by key name, so repeated keys keep their
///   relative order
///
/// Case is preserved. The storage key is the hex SHA-256 of the canonical
/// URL, so it has a fixed length whatever the path looks like.
#[derive(Debug, Clone)]
pub struct ResourceKey {
  url: Url,
  canonical: String,
  hash: String,
}

impl ResourceKey {
  /// Resolve `resource` against `base` and derive its key.
  pub fn resolve(base: &Url, resource: &str) -> Result<Self> {
    if resource.trim().is_empty() {
      return Err(Error::EmptyResource);
    }

    let url = base.join(resource).map_err(|source| Error::InvalidUrl {
      input: resource.to_string(),
      source,
    })?;

    Ok(Self::from_url(url))
  }

  pub fn from_url(url: Url) -> Self {
    let canonical = canonicalize(&url);

    let mut hasher = Sha256::new();
    hasher.update(b"resource:");
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Self {
      url,
      canonical,
      hash,
    }
  }

  /// Storage key.
  pub fn as_str(&self) -> &str {
    &self.hash
  }

  /// Canonical URL the storage key was hashed from.
  pub fn canonical(&self) -> &str {
    &self.canonical
  }

  /// The URL as resolved, before canonicalization. This is what gets requested.
  pub fn url(&self) -> &Url {
    &self.url
  }
}

impl PartialEq for ResourceKey {
  fn eq(&self, other: &Self) -> bool {
    self.hash == other.hash
  }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.hash.hash(state);
  }
}

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.canonical)
  }
}

fn canonicalize(url: &Url) -> String {
  let mut url = url.clone();
  url.set_fragment(None);

  let query = url.query().map(sort_query);
  match query.as_deref() {
    Some("") | None => url.set_query(None),
    Some(q) => url.set_query(Some(q)),
  }

  url.into()
}

fn sort_query(query: &str) -> String {
  let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
  // Stable: repeated keys are often order-sensitive
  pairs.sort_by(|a, b| query_name(a).cmp(query_name(b)));
  pairs.join("&")
}

fn query_name(pair: &str) -> &str {
  pair.split_once('=').map_or(pair, |(name, _)| name)
}
