//! SPID identity normalization and session token lifecycle.
//!
//! - [`identity`]: turns a verified SPID identity into a canonical user
//! - [`token`]: signed and opaque token strategies plus the lifecycle service
//! - [`clients`]: Attribute Authority and Personal Data Vault adapters
//! - [`acs`]: the login pipeline chaining all of the above
//! - [`http`]: axum handlers

pub mod acs;
pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod token;
pub mod user;

#[cfg(test)]
mod test_support;

pub use acs::{AcsOutcome, AssertionConsumer};
pub use config::{ConfigError, GatewayConfig, TokenMode};
pub use error::{AuthError, AuthResult, ErrorCategory};
pub use identity::SpidIdentity;
pub use token::{IntrospectionResponse, IssuedToken, TokenService, build_token_backend};
pub use user::{
    CommonTokenUser, Company, SpidLevel, TokenLevel, TokenUser, TokenUserL1, TokenUserL2,
};
