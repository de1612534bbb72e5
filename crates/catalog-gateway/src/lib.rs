//! Catalog gateway library for browsing anime and manga from MyAnimeList.
//!
//! All traffic to the Jikan API v4 goes through one [`Gateway`] per base URL,
//! which caches responses with a TTL, serializes requests with a pacing
//! delay, and retries throttled requests with exponential backoff.

pub mod api;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod gateway;
pub mod store;

#[cfg(test)]
mod test_support;

pub use api::{HttpTransport, Params, Transport};
pub use catalog::{CacheTtls, Catalog, MediaKind};
pub use clock::{Clock, SystemClock};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{Gateway, GatewaySettings};
pub use store::{CacheEntry, CacheStats, CacheStore, MemoryStore, SqliteStore};
