//! JSON REST client built on the cache, connectivity and transport layers.

mod builder;
mod client;

pub use builder::RestClientBuilder;
pub use client::{RestClient, DEFAULT_CACHE_HOURS};
