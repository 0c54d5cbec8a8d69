//! Redis Cluster adapter.

use async_trait::async_trait;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;

use crate::commands;
use crate::error::{CacheError, CacheResult};
use crate::SessionCache;

/// Session cache talking to a Redis Cluster.
///
/// The underlying connection multiplexes requests and routes each key to
/// its slot owner, so clones are cheap and share the same topology view.
#[derive(Clone)]
pub struct RedisClusterCache {
    connection: ClusterConnection,
}

impl RedisClusterCache {
    /// Connects to the cluster using the given seed nodes.
    ///
    /// # Errors
    /// Returns `CacheError::Connection` if no seed node accepts a connection.
    pub async fn connect(nodes: &[String]) -> CacheResult<Self> {
        let client = ClusterClient::new(nodes.to_vec())
            .map_err(|e| CacheError::connection(e.to_string()))?;
        let connection = client
            .get_async_connection()
            .await
            .map_err(|e| CacheError::connection(e.to_string()))?;

        tracing::info!(seed_nodes = nodes.len(), "Connected to Redis cluster");
        Ok(Self { connection })
    }
}

#[async_trait]
impl SessionCache for RedisClusterCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection.clone();
        commands::get(&mut conn, key).await
    }

    async fn set_with_expiration(&self, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        commands::set_ex(&mut conn, key, value, ttl_seconds).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        commands::del(&mut conn, key).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        commands::exists(&mut conn, key).await
    }

    async fn ping(&self) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        commands::ping(&mut conn).await
    }

    fn kind(&self) -> &'static str {
        "redis-cluster"
    }
}
