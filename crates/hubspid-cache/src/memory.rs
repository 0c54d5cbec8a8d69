//! In-process cache backed by `DashMap`, for local development and tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{CacheError, CacheResult};
use crate::SessionCache;

/// A stored value with its expiry deadline.
#[derive(Clone, Debug)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Single-instance session cache.
///
/// Entries expire lazily: an expired entry is treated as absent and
/// removed the next time it is touched.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key` for an arbitrary duration.
    ///
    /// # Errors
    /// Returns `CacheError::InvalidExpiration` for a zero duration.
    pub fn insert_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        if ttl.is_zero() {
            return Err(CacheError::invalid_expiration(key));
        }
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries currently held, including not yet purged ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }
}

#[async_trait]
impl SessionCache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.live_value(key))
    }

    async fn set_with_expiration(&self, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<()> {
        self.insert_with_ttl(key, value, Duration::from_secs(ttl_seconds))
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        match self.entries.remove(key) {
            Some((_, entry)) => Ok(!entry.is_expired()),
            None => Ok(false),
        }
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.live_value(key).is_some())
    }

    async fn ping(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set() {
        let cache = MemoryCache::new();
        cache
            .set_with_expiration("session-token:abc", "{\"level\":\"L1\"}", 60)
            .await
            .unwrap();

        let value = cache.get("session-token:abc").await.unwrap();
        assert_eq!(value.as_deref(), Some("{\"level\":\"L1\"}"));
        assert!(cache.exists("session-token:abc").await.unwrap());
        assert!(cache.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = MemoryCache::new();
        cache.set_with_expiration("k", "first", 60).await.unwrap();
        cache.set_with_expiration("k", "second", 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let cache = MemoryCache::new();
        let err = cache.set_with_expiration("k", "v", 0).await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidExpiration { .. }));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_delete_reports_removal() {
        let cache = MemoryCache::new();
        cache.set_with_expiration("k", "v", 60).await.unwrap();

        assert!(cache.delete("k").await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_expiration() {
        let cache = MemoryCache::new();
        cache
            .insert_with_ttl("expiring", "v", Duration::from_millis(50))
            .unwrap();
        assert!(cache.get("expiring").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(cache.get("expiring").await.unwrap().is_none());
        assert!(!cache.exists("expiring").await.unwrap());
        assert!(!cache.delete("expiring").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache
            .insert_with_ttl("short", "v", Duration::from_millis(20))
            .unwrap();
        cache.insert_with_ttl("long", "v", Duration::from_secs(60)).unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_ping() {
        assert!(MemoryCache::new().ping().await.unwrap());
    }
}
