//! Single-node Redis adapter backed by a `deadpool-redis` pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};

use crate::commands;
use crate::error::{CacheError, CacheResult};
use crate::{SessionCache, key_namespace};

/// Session cache talking to one Redis node.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    /// Wraps an existing connection pool.
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool for `url` with the given size and per-stage timeout.
    ///
    /// The pool connects lazily; call [`SessionCache::ping`] to verify
    /// the backend is reachable.
    ///
    /// # Errors
    /// Returns `CacheError::Connection` if the URL cannot be parsed.
    pub fn connect(url: &str, pool_size: usize, timeout: Duration) -> CacheResult<Self> {
        let mut redis_config = deadpool_redis::Config::from_url(url);
        let mut pool_config = PoolConfig::new(pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::connection(e.to_string()))?;

        Ok(Self::from_pool(pool))
    }
}

#[async_trait]
impl SessionCache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.pool.get().await?;
        let value = commands::get(&mut conn, key).await?;
        tracing::debug!(namespace = key_namespace(key), hit = value.is_some(), "cache get");
        Ok(value)
    }

    async fn set_with_expiration(&self, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<()> {
        let mut conn = self.pool.get().await?;
        commands::set_ex(&mut conn, key, value, ttl_seconds).await?;
        tracing::debug!(namespace = key_namespace(key), ttl_secs = ttl_seconds, "cache set");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.pool.get().await?;
        commands::del(&mut conn, key).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.pool.get().await?;
        commands::exists(&mut conn, key).await
    }

    async fn ping(&self) -> CacheResult<bool> {
        let mut conn = self.pool.get().await?;
        commands::ping(&mut conn).await
    }

    fn kind(&self) -> &'static str {
        "redis"
    }
}
