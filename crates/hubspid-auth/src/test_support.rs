//! Shared test doubles.

use std::sync::Mutex;

use async_trait::async_trait;
use hubspid_cache::{CacheError, CacheResult, MemoryCache, SessionCache};

/// A cache whose every call fails with a connection error.
pub struct FailingCache;

#[async_trait]
impl SessionCache for FailingCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(CacheError::connection("connection refused"))
    }

    async fn set_with_expiration(&self, _key: &str, _value: &str, _ttl: u64) -> CacheResult<()> {
        Err(CacheError::connection("connection refused"))
    }

    async fn delete(&self, _key: &str) -> CacheResult<bool> {
        Err(CacheError::connection("connection refused"))
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Err(CacheError::connection("connection refused"))
    }

    async fn ping(&self) -> CacheResult<bool> {
        Err(CacheError::connection("connection refused"))
    }

    fn kind(&self) -> &'static str {
        "failing"
    }
}

/// An in-memory cache that remembers every write and its TTL.
#[derive(Default)]
pub struct RecordingCache {
    inner: MemoryCache,
    writes: Mutex<Vec<(String, u64)>>,
}

impl RecordingCache {
    /// `(key, ttl_seconds)` of every write so far.
    pub fn writes(&self) -> Vec<(String, u64)> {
        self.writes.lock().expect("writes lock").clone()
    }
}

#[async_trait]
impl SessionCache for RecordingCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set_with_expiration(&self, key: &str, value: &str, ttl: u64) -> CacheResult<()> {
        self.writes
            .lock()
            .expect("writes lock")
            .push((key.to_string(), ttl));
        self.inner.set_with_expiration(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.inner.exists(key).await
    }

    async fn ping(&self) -> CacheResult<bool> {
        self.inner.ping().await
    }

    fn kind(&self) -> &'static str {
        "recording"
    }
}
