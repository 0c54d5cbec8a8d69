//! The token strategy seam.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{GatewayConfig, TokenMode};
use crate::error::AuthResult;
use crate::user::{TokenLevel, TokenUser};

/// Cache key prefix for opaque token payloads.
pub const SESSION_TOKEN_PREFIX: &str = "session-token:";

/// Cache key prefix for invalidated signed tokens.
pub const INVALIDATED_TOKEN_PREFIX: &str = "session-token-invalidate:";

/// Outcome of inspecting a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// The token is valid and stands for this user.
    Active(TokenUser),
    /// The token was invalidated, has expired, or does not verify.
    Inactive,
}

/// Token lifetime policy.
///
/// With Attribute Authority tiering, L1 and L2 tokens get their own
/// lifetimes; otherwise every token gets the global one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtl {
    default: Duration,
    tiers: Option<(Duration, Duration)>,
}

impl TokenTtl {
    /// One lifetime for every token.
    #[must_use]
    pub fn fixed(ttl: Duration) -> Self {
        Self {
            default: ttl,
            tiers: None,
        }
    }

    /// Separate L1 and L2 lifetimes.
    #[must_use]
    pub fn tiered(default: Duration, l1: Duration, l2: Duration) -> Self {
        Self {
            default,
            tiers: Some((l1, l2)),
        }
    }

    /// Derives the policy from configuration.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        let aa = &config.attribute_authority;
        if aa.enabled {
            Self::tiered(
                config.token.expiration,
                aa.l1_token_expiration,
                aa.l2_token_expiration,
            )
        } else {
            Self::fixed(config.token.expiration)
        }
    }

    /// The longest lifetime any token can be issued with.
    #[must_use]
    pub fn longest(&self) -> Duration {
        match self.tiers {
            Some((l1, l2)) => l1.max(l2),
            None => self.default,
        }
    }

    /// Lifetime for a token of the given level.
    #[must_use]
    pub fn for_level(&self, level: TokenLevel) -> Duration {
        match (self.tiers, level) {
            (Some((l1, _)), TokenLevel::L1) => l1,
            (Some((_, l2)), TokenLevel::L2) => l2,
            (None, _) => self.default,
        }
    }
}

/// A token representation strategy.
#[async_trait]
pub trait TokenBackend: Send + Sync {
    /// The strategy this backend implements.
    fn mode(&self) -> TokenMode;

    /// Issues a new token for `user`.
    ///
    /// `request_id` becomes the token id where the strategy has one.
    async fn generate(&self, user: &TokenUser, request_id: Option<&str>) -> AuthResult<String>;

    /// Reports whether `token` is active and for whom.
    async fn introspect(&self, token: &str) -> AuthResult<TokenStatus>;

    /// Invalidates `token`. Returns the acknowledgement of the cache.
    async fn invalidate(&self, token: &str) -> AuthResult<bool>;

    /// Returns the raw user data a token stands for, for upgrade.
    async fn resolve(&self, token: &str) -> AuthResult<Value>;
}
