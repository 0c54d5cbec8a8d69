//! Opaque (cache-backed) token strategy.

use async_trait::async_trait;
use hubspid_cache::SharedCache;
use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::Value;

use super::backend::{SESSION_TOKEN_PREFIX, TokenBackend, TokenStatus, TokenTtl};
use crate::config::TokenMode;
use crate::error::{AuthError, AuthResult};
use crate::user::TokenUser;

/// Number of random bytes in an opaque token.
const OPAQUE_TOKEN_BYTES: usize = 32;

/// Random hex tokens whose user is stored in the cache.
pub struct OpaqueTokenBackend {
    cache: SharedCache,
    ttl: TokenTtl,
}

impl OpaqueTokenBackend {
    pub fn new(cache: SharedCache, ttl: TokenTtl) -> Self {
        Self { cache, ttl }
    }

    fn session_key(token: &str) -> String {
        format!("{SESSION_TOKEN_PREFIX}{token}")
    }

    fn random_token() -> String {
        let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    async fn load(&self, token: &str) -> AuthResult<Value> {
        let payload = self
            .cache
            .get(&Self::session_key(token))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Session lookup failed");
                AuthError::internal("Cannot introspect token")
            })?
            .ok_or_else(|| AuthError::not_found("Token not found"))?;

        serde_json::from_str(&payload).map_err(|e| {
            tracing::warn!(error = %e, "Stored session is not JSON");
            AuthError::internal("Error parsing token")
        })
    }
}

#[async_trait]
impl TokenBackend for OpaqueTokenBackend {
    fn mode(&self) -> TokenMode {
        TokenMode::Opaque
    }

    async fn generate(&self, user: &TokenUser, _request_id: Option<&str>) -> AuthResult<String> {
        let token = Self::random_token();
        let payload = serde_json::to_string(user)
            .map_err(|e| AuthError::internal(format!("Cannot serialize token user: {e}")))?;
        let ttl = self.ttl.for_level(user.level());

        self.cache
            .set_with_expiration(&Self::session_key(&token), &payload, ttl.as_secs())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Session write failed");
                AuthError::internal("Error storing Opaque Token")
            })?;

        Ok(token)
    }

    async fn introspect(&self, token: &str) -> AuthResult<TokenStatus> {
        let raw = self.load(token).await?;
        let user = TokenUser::from_value(raw).map_err(|e| {
            tracing::warn!(error = %e, "Stored session does not carry a valid user");
            AuthError::internal("Error decoding token")
        })?;
        Ok(TokenStatus::Active(user))
    }

    async fn invalidate(&self, token: &str) -> AuthResult<bool> {
        self.cache
            .delete(&Self::session_key(token))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Session delete failed");
                AuthError::internal("Error while invalidating Token")
            })
    }

    async fn resolve(&self, token: &str) -> AuthResult<Value> {
        self.load(token).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use hubspid_cache::{MemoryCache, SessionCache};

    use super::*;
    use crate::test_support::FailingCache;
    use crate::user::TokenLevel;
    use crate::user::fixtures::l1_user_from_aa;

    fn backend_with(cache: SharedCache) -> OpaqueTokenBackend {
        OpaqueTokenBackend::new(cache, TokenTtl::fixed(Duration::from_secs(3600)))
    }

    #[test]
    fn test_random_token_shape() {
        let token = OpaqueTokenBackend::random_token();
        assert_eq!(token.len(), OPAQUE_TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, OpaqueTokenBackend::random_token());
    }

    #[tokio::test]
    async fn test_generate_stores_user() {
        let cache = Arc::new(MemoryCache::new());
        let backend = backend_with(cache.clone());
        let user = TokenUser::from(l1_user_from_aa());

        let token = backend.generate(&user, Some("_req-1")).await.unwrap();
        let stored = cache
            .get(&format!("{SESSION_TOKEN_PREFIX}{token}"))
            .await
            .unwrap()
            .unwrap();
        let stored: Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(stored["level"], "L1");
        assert_eq!(TokenUser::from_value(stored).unwrap(), user);
    }

    #[tokio::test]
    async fn test_introspect_hit_and_miss() {
        let backend = backend_with(Arc::new(MemoryCache::new()));
        let token = backend
            .generate(&TokenUser::from(l1_user_from_aa()), None)
            .await
            .unwrap();

        match backend.introspect(&token).await.unwrap() {
            TokenStatus::Active(user) => assert_eq!(user.level(), TokenLevel::L1),
            TokenStatus::Inactive => panic!("expected active token"),
        }

        let err = backend.introspect("deadbeef").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound { .. }));
        assert_eq!(err.detail(), "Token not found");
    }

    #[tokio::test]
    async fn test_introspect_corrupted_session() {
        let cache = Arc::new(MemoryCache::new());
        cache
            .set_with_expiration("session-token:broken", "{not json", 60)
            .await
            .unwrap();
        cache
            .set_with_expiration("session-token:shapeless", "{\"level\":\"L2\"}", 60)
            .await
            .unwrap();
        let backend = backend_with(cache);

        let err = backend.introspect("broken").await.unwrap_err();
        assert_eq!(err.detail(), "Error parsing token");

        let err = backend.introspect("shapeless").await.unwrap_err();
        assert_eq!(err.detail(), "Error decoding token");
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let backend = backend_with(Arc::new(MemoryCache::new()));
        let token = backend
            .generate(&TokenUser::from(l1_user_from_aa()), None)
            .await
            .unwrap();

        assert!(backend.invalidate(&token).await.unwrap());
        assert!(!backend.invalidate(&token).await.unwrap());
        assert!(backend.introspect(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_generate_cache_failure() {
        let backend = backend_with(Arc::new(FailingCache));
        let err = backend
            .generate(&TokenUser::from(l1_user_from_aa()), None)
            .await
            .unwrap_err();
        assert_eq!(err.detail(), "Error storing Opaque Token");
    }
}
