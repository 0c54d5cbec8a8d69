//! Token codec and lifecycle.
//!
//! Two interchangeable strategies implement [`TokenBackend`]:
//!
//! - [`SignedTokenBackend`]: stateless JWTs; the cache only holds a
//!   blacklist of invalidated tokens
//! - [`OpaqueTokenBackend`]: random hex keys; the user lives in the cache
//!
//! The strategy is chosen once at startup by [`build_token_backend`];
//! [`TokenService`] drives the lifecycle on top of it.

pub mod backend;
pub mod jwt;
pub mod opaque;
pub mod service;
pub mod signed;

use std::sync::Arc;

use hubspid_cache::SharedCache;

pub use backend::{
    INVALIDATED_TOKEN_PREFIX, SESSION_TOKEN_PREFIX, TokenBackend, TokenStatus, TokenTtl,
};
pub use jwt::{JwtError, JwtService, SigningAlgorithm, SigningKeyPair};
pub use opaque::OpaqueTokenBackend;
pub use service::{IntrospectionResponse, IssuedToken, TokenService};
pub use signed::SignedTokenBackend;

use crate::config::{GatewayConfig, TokenMode};
use crate::error::{AuthError, AuthResult};

/// Builds the configured token strategy.
///
/// # Errors
/// Returns `AuthError::Configuration` if the signing key cannot be loaded.
pub fn build_token_backend(
    config: &GatewayConfig,
    cache: SharedCache,
) -> AuthResult<Arc<dyn TokenBackend>> {
    let ttl = TokenTtl::from_config(config);

    match config.token.mode {
        TokenMode::Opaque => {
            tracing::info!("Using opaque tokens");
            Ok(Arc::new(OpaqueTokenBackend::new(cache, ttl)))
        }
        TokenMode::Jwt => {
            let algorithm = config
                .jwt
                .signing_algorithm()
                .map_err(|e| AuthError::configuration(e.to_string()))?;
            let pem = config
                .jwt
                .load_private_key()
                .map_err(|e| AuthError::configuration(e.to_string()))?;
            let key_pair = SigningKeyPair::from_private_pem(config.jwt.kid.clone(), algorithm, &pem)?;
            let jwt = JwtService::new(key_pair, config.jwt.issuer.clone())
                .with_audience(config.jwt.audience.clone());

            tracing::info!(
                issuer = %config.jwt.issuer,
                algorithm = %algorithm,
                "Using signed tokens"
            );
            Ok(Arc::new(SignedTokenBackend::new(Arc::new(jwt), cache, ttl)))
        }
    }
}
