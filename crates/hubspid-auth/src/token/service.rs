//! Token lifecycle orchestration.
//!
//! [`TokenService`] is the single entry point for issuing, introspecting,
//! invalidating and upgrading tokens. It is strategy-agnostic: everything
//! representation-specific lives behind [`TokenBackend`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::backend::{TokenBackend, TokenStatus};
use crate::config::TokenMode;
use crate::error::{AuthError, AuthResult};
use crate::identity::{resolve_token_user, to_token_user_l2};
use crate::user::{CommonTokenUser, Company, TokenLevel, TokenUser};

/// A freshly issued token and the user it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub user: TokenUser,
}

/// Introspection response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<TokenLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<TokenUser>,
}

impl IntrospectionResponse {
    /// An inactive token.
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            active: false,
            level: None,
            user: None,
        }
    }
}

/// Orchestrates the token lifecycle over the configured strategy.
pub struct TokenService {
    backend: Arc<dyn TokenBackend>,
    include_user_on_introspection: bool,
}

impl TokenService {
    /// Creates a new token service.
    pub fn new(backend: Arc<dyn TokenBackend>, include_user_on_introspection: bool) -> Self {
        Self {
            backend,
            include_user_on_introspection,
        }
    }

    /// Returns the configured token strategy.
    #[must_use]
    pub fn mode(&self) -> TokenMode {
        self.backend.mode()
    }

    /// Issues a token for an already-resolved user.
    ///
    /// # Errors
    /// Propagates validation, signing and cache errors.
    pub async fn issue(&self, user: TokenUser, request_id: Option<&str>) -> AuthResult<IssuedToken> {
        user.validate()?;
        let token = self.backend.generate(&user, request_id).await?;

        tracing::info!(
            level = %user.level(),
            from_aa = user.from_aa(),
            mode = ?self.backend.mode(),
            "Token issued"
        );
        Ok(IssuedToken { token, user })
    }

    /// Resolves L1/L2 from the Attribute Authority result, then issues.
    ///
    /// # Errors
    /// Returns `AuthError::Forbidden` when the lookup produced no company.
    pub async fn issue_for(
        &self,
        common: CommonTokenUser,
        companies: Option<Vec<Company>>,
        request_id: Option<&str>,
    ) -> AuthResult<IssuedToken> {
        let user = resolve_token_user(common, companies)?;
        self.issue(user, request_id).await
    }

    /// Inspects a token.
    ///
    /// An inactive token is not an error; the caller decides how to report it.
    ///
    /// # Errors
    /// Returns `AuthError::NotFound` for unknown opaque tokens and
    /// `AuthError::Internal` when the token cannot be read.
    pub async fn introspect(&self, token: &str) -> AuthResult<IntrospectionResponse> {
        match self.backend.introspect(token).await? {
            TokenStatus::Inactive => Ok(IntrospectionResponse::inactive()),
            TokenStatus::Active(user) if self.include_user_on_introspection => {
                Ok(IntrospectionResponse {
                    active: true,
                    level: Some(user.level()),
                    user: Some(user),
                })
            }
            TokenStatus::Active(_) => Ok(IntrospectionResponse {
                active: true,
                level: None,
                user: None,
            }),
        }
    }

    /// Invalidates a token, returning the cache acknowledgement.
    ///
    /// # Errors
    /// Returns `AuthError::Validation` for signed tokens whose expiry cannot
    /// be read, and `AuthError::Internal` on cache failure.
    pub async fn invalidate(&self, token: &str) -> AuthResult<bool> {
        let invalidated = self.backend.invalidate(token).await?;
        tracing::info!(invalidated, "Token invalidation requested");
        Ok(invalidated)
    }

    /// Exchanges an L1 token for a new L2 token bound to one company.
    ///
    /// The L1 token stays valid.
    ///
    /// # Errors
    /// - `AuthError::Validation` if the token is not an L1 token
    /// - `AuthError::NotAuthorityGranted` if it did not come from the Attribute Authority
    /// - `AuthError::NotFound` if the organization is not among its companies
    pub async fn upgrade(
        &self,
        l1_token: &str,
        organization_fiscal_code: &str,
    ) -> AuthResult<IssuedToken> {
        let raw = self.backend.resolve(l1_token).await?;

        let l1 = match TokenUser::from_value(raw) {
            Ok(TokenUser::L1(user)) => user,
            Ok(TokenUser::L2(_)) | Err(_) => {
                return Err(AuthError::validation(
                    "Cannot upgrade Token because it is not an L1 Token",
                ));
            }
        };

        if !l1.from_aa {
            return Err(AuthError::NotAuthorityGranted);
        }

        let company = l1
            .companies
            .iter()
            .flatten()
            .find(|c| c.organization_fiscal_code == organization_fiscal_code)
            .cloned()
            .ok_or_else(|| AuthError::not_found("Organization Not Found"))?;

        let l2 = to_token_user_l2(&l1, company);
        let issued = self.issue(TokenUser::L2(l2), None).await?;
        tracing::info!("Token upgraded to L2");
        Ok(issued)
    }
}
