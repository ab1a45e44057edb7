//! Local response cache used for read-through fetching and offline support.
//!
//! This module provides:
//! - Resource keys derived from the resolved URL, so equivalent references share one entry
//! - A storage trait with SQLite and in-memory backends
//! - Time-based expiry decided by the store itself
//! - Metadata telling callers whether data came from the network or cache

mod key;
mod memory;
mod source;
mod storage;

pub use key::ResourceKey;
pub use memory::MemoryStore;
pub use source::{FetchSource, Fetched};
pub use storage::{CacheStore, CachedEntry, SqliteStore};
