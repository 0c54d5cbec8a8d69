//! Signed (JWT) token strategy.

use std::sync::Arc;

use async_trait::async_trait;
use hubspid_cache::SharedCache;
use serde_json::Value;

use super::backend::{INVALIDATED_TOKEN_PREFIX, TokenBackend, TokenStatus, TokenTtl};
use super::jwt::{JwtService, remaining_validity};
use crate::config::TokenMode;
use crate::error::{AuthError, AuthResult};
use crate::user::TokenUser;

/// Stateless tokens: the JWT carries the user, the cache only remembers
/// invalidated tokens until they would have expired anyway.
pub struct SignedTokenBackend {
    jwt: Arc<JwtService>,
    cache: SharedCache,
    ttl: TokenTtl,
}

impl SignedTokenBackend {
    pub fn new(jwt: Arc<JwtService>, cache: SharedCache, ttl: TokenTtl) -> Self {
        Self { jwt, cache, ttl }
    }

    fn blacklist_key(token: &str) -> String {
        format!("{INVALIDATED_TOKEN_PREFIX}{token}")
    }

    async fn is_invalidated(&self, token: &str) -> AuthResult<bool> {
        self.cache
            .exists(&Self::blacklist_key(token))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Blacklist lookup failed");
                AuthError::internal("Cannot introspect token")
            })
    }
}

#[async_trait]
impl TokenBackend for SignedTokenBackend {
    fn mode(&self) -> TokenMode {
        TokenMode::Jwt
    }

    async fn generate(&self, user: &TokenUser, request_id: Option<&str>) -> AuthResult<String> {
        let jti = match request_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => ulid::Ulid::new().to_string(),
        };
        let ttl = self.ttl.for_level(user.level());

        self.jwt.sign_user(user, ttl, &jti).map_err(|e| {
            tracing::error!(error = %e, "JWT signing failed");
            AuthError::signing("Error generating JWT Token")
        })
    }

    async fn introspect(&self, token: &str) -> AuthResult<TokenStatus> {
        if self.is_invalidated(token).await? {
            tracing::debug!("Token is blacklisted");
            return Ok(TokenStatus::Inactive);
        }

        let claims = match self.jwt.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Token verification failed");
                return Ok(TokenStatus::Inactive);
            }
        };

        let user = TokenUser::from_value(claims).map_err(|e| {
            tracing::warn!(error = %e, "Signed token does not carry a valid user");
            AuthError::internal("Error decoding token")
        })?;
        Ok(TokenStatus::Active(user))
    }

    async fn invalidate(&self, token: &str) -> AuthResult<bool> {
        // Blacklist only verifiable tokens, for at most the longest issued lifetime.
        let claims = match self.jwt.verify(token) {
            Ok(Value::Object(claims)) => claims,
            Ok(_) => {
                return Err(AuthError::validation(
                    "Error while invalidating Token: claims are not an object",
                ));
            }
            Err(e) => {
                tracing::debug!(error = %e, "Refusing to blacklist unverifiable token");
                return Err(AuthError::validation(format!(
                    "Error while invalidating Token: {e}"
                )));
            }
        };
        let remaining = remaining_validity(&claims)
            .map_err(|e| AuthError::validation(format!("Error while invalidating Token: {e}")))?
            .min(self.ttl.longest().as_secs());

        self.cache
            .set_with_expiration(&Self::blacklist_key(token), "true", remaining)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Blacklist write failed");
                AuthError::internal("Error while invalidating Token")
            })?;

        tracing::debug!(ttl_secs = remaining, "Token blacklisted");
        Ok(true)
    }

    async fn resolve(&self, token: &str) -> AuthResult<Value> {
        if self.is_invalidated(token).await? {
            return Err(AuthError::validation("Token has been invalidated"));
        }
        self.jwt.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Token verification failed");
            AuthError::validation(format!("Invalid token: {e}"))
        })
    }
}
