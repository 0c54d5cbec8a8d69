//! Session cache primitives for the HubSpid gateway.
//!
//! Every component that needs shared state (opaque token payloads, the
//! signed-token blacklist) goes through the [`SessionCache`] trait. The
//! concrete adapter is chosen once at startup:
//!
//! - [`RedisCache`]: a single Redis node behind a `deadpool-redis` pool
//! - [`RedisClusterCache`]: a Redis Cluster
//! - [`MemoryCache`]: an in-process `DashMap`, for local runs and tests
//!
//! All adapters share the same contract: a missing key is `Ok(None)`, a
//! falsy acknowledgement is an error, and writes always carry a TTL.

mod cluster;
mod commands;
pub mod error;
mod memory;
pub mod reply;
mod single;

use std::sync::Arc;

use async_trait::async_trait;

pub use cluster::RedisClusterCache;
pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use single::RedisCache;

/// The part of `key` before the first `:`, safe to log.
///
/// Session keys embed bearer tokens after the prefix.
#[must_use]
pub fn key_namespace(key: &str) -> &str {
    key.split_once(':').map_or("<unprefixed>", |(namespace, _)| namespace)
}

/// Shared handle to the configured cache adapter.
pub type SharedCache = Arc<dyn SessionCache>;

/// Key/value store with per-key expiration.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Reads a key. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Writes a key unconditionally with an expiration in seconds.
    ///
    /// A zero TTL or a non-`OK` acknowledgement is an error.
    async fn set_with_expiration(&self, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<()>;

    /// Removes a key. Returns `true` iff exactly one key was removed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Returns `true` if the key is present.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Liveness probe.
    async fn ping(&self) -> CacheResult<bool>;

    /// Short adapter name for logs.
    fn kind(&self) -> &'static str;
}
