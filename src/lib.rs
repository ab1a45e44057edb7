//! Connectivity-aware JSON REST client with a read-through local cache.
//!
//! GET requests are answered from the cache while it is fresh, fetched over
//! HTTP and cached otherwise, and fall back to stale cached data when no
//! network path exists. POST, PUT and DELETE bypass the cache.
//!
//! ```ignore
//! let client = RestClient::builder("https://api.example.com/")
//!   .header("X-Api-Key", key)
//!   .cache(Arc::new(SqliteStore::open()?))
//!   .build()?;
//!
//! let item: Item = client.fetch("items/1", 24).await?;
//! client.create("items", &new_item).await?;
//! ```

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod rest;
pub mod transport;

pub use cache::{CacheStore, FetchSource, Fetched, MemoryStore, ResourceKey, SqliteStore};
pub use connectivity::{Connectivity, StaticConnectivity, TcpProbe};
pub use error::{Error, Result};
pub use rest::{RestClient, RestClientBuilder, DEFAULT_CACHE_HOURS};
pub use transport::{RawResponse, ReqwestTransport, Transport, TransportError};
