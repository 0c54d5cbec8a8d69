//! Assertion consumer.
//!
//! Turns a verified SPID identity into a session token and the redirect the
//! browser should follow. SAML validation happens upstream; this module only
//! sees the extracted attributes.

use std::sync::Arc;

use url::Url;

use crate::clients::{AttributeAuthority, PersonalDataVault};
use crate::config::{EndpointSettings, GatewayConfig};
use crate::error::{AuthError, AuthResult};
use crate::identity::{SpidIdentity, to_common_token_user};
use crate::token::{IssuedToken, TokenService};
use crate::user::TokenLevel;

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcsOutcome {
    /// Where the browser goes next, with the token in the query string.
    pub redirect_url: String,
    pub token: String,
    pub level: TokenLevel,
}

/// Orchestrates normalization, pseudonymization, company lookup and token
/// issuance for one assertion.
pub struct AssertionConsumer {
    token_service: Arc<TokenService>,
    attribute_authority: Option<Arc<dyn AttributeAuthority>>,
    personal_data_vault: Option<Arc<dyn PersonalDataVault>>,
    endpoints: EndpointSettings,
    l1_success_endpoint: Option<String>,
}

impl AssertionConsumer {
    /// Creates a consumer with neither Attribute Authority nor vault.
    pub fn new(token_service: Arc<TokenService>, endpoints: EndpointSettings) -> Self {
        Self {
            token_service,
            attribute_authority: None,
            personal_data_vault: None,
            endpoints,
            l1_success_endpoint: None,
        }
    }

    /// Creates a consumer wired from gateway configuration.
    pub fn from_config(
        config: &GatewayConfig,
        token_service: Arc<TokenService>,
        attribute_authority: Option<Arc<dyn AttributeAuthority>>,
        personal_data_vault: Option<Arc<dyn PersonalDataVault>>,
    ) -> Self {
        let mut consumer = Self::new(token_service, config.endpoints.clone());
        if let Some(authority) = attribute_authority {
            consumer = consumer.with_attribute_authority(
                authority,
                config.attribute_authority.l1_success_endpoint.clone(),
            );
        }
        if let Some(vault) = personal_data_vault {
            consumer = consumer.with_personal_data_vault(vault);
        }
        consumer
    }

    /// Enables the company lookup. L1 tokens then redirect to
    /// `l1_success_endpoint` when one is set.
    #[must_use]
    pub fn with_attribute_authority(
        mut self,
        authority: Arc<dyn AttributeAuthority>,
        l1_success_endpoint: Option<String>,
    ) -> Self {
        self.attribute_authority = Some(authority);
        self.l1_success_endpoint = l1_success_endpoint;
        self
    }

    /// Enables pseudonymization through the vault.
    #[must_use]
    pub fn with_personal_data_vault(mut self, vault: Arc<dyn PersonalDataVault>) -> Self {
        self.personal_data_vault = Some(vault);
        self
    }

    /// Consumes a verified identity.
    ///
    /// The assertion's `InResponseTo` becomes the token id, so a replayed
    /// assertion yields the same `jti`.
    ///
    /// # Errors
    /// - `AuthError::Validation` for malformed identities
    /// - `AuthError::Forbidden` when the Attribute Authority denies the user
    /// - `AuthError::Upstream` when an external service fails
    pub async fn consume(&self, identity: &SpidIdentity) -> AuthResult<AcsOutcome> {
        let mut common = to_common_token_user(identity)?;

        if let Some(vault) = &self.personal_data_vault {
            common.id = Some(vault.blur_user(&common).await?);
        }

        let companies = match &self.attribute_authority {
            Some(authority) => Some(authority.user_companies(&common.fiscal_number).await?),
            None => None,
        };

        let IssuedToken { token, user } = self
            .token_service
            .issue_for(common, companies, identity.in_response_to.as_deref())
            .await?;
        let level = user.level();

        let target = match (&self.attribute_authority, &self.l1_success_endpoint, level) {
            (Some(_), Some(l1_endpoint), TokenLevel::L1) => l1_endpoint.as_str(),
            _ => self.endpoints.success.as_str(),
        };
        let redirect_url = with_query_pair(target, "token", &token)?;

        tracing::info!(level = %level, "Assertion consumed");
        Ok(AcsOutcome {
            redirect_url,
            token,
            level,
        })
    }

    /// Redirect target after a single logout.
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` if the success endpoint is not a URL.
    pub fn logout_redirect(&self) -> AuthResult<String> {
        let mut url = parse_endpoint(&self.endpoints.success)?;
        url.set_query(Some("logout"));
        Ok(url.to_string())
    }

    /// Redirect target after a failed login.
    #[must_use]
    pub fn error_redirect(&self) -> &str {
        &self.endpoints.error
    }
}

fn parse_endpoint(endpoint: &str) -> AuthResult<Url> {
    Url::parse(endpoint)
        .map_err(|e| AuthError::configuration(format!("invalid redirect endpoint '{endpoint}': {e}")))
}

fn with_query_pair(endpoint: &str, key: &str, value: &str) -> AuthResult<String> {
    let mut url = parse_endpoint(endpoint)?;
    url.query_pairs_mut().append_pair(key, value);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use hubspid_cache::MemoryCache;

    use super::*;
    use crate::token::{OpaqueTokenBackend, TokenTtl};
    use crate::user::fixtures::company;
    use crate::user::{CommonTokenUser, Company, SpidLevel, TokenUser};

    struct StaticAuthority {
        companies: Option<Vec<Company>>,
        queried: Mutex<Vec<String>>,
    }

    impl StaticAuthority {
        fn returning(companies: Vec<Company>) -> Arc<Self> {
            Arc::new(Self {
                companies: Some(companies),
                queried: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AttributeAuthority for StaticAuthority {
        async fn user_companies(&self, fiscal_code: &str) -> AuthResult<Vec<Company>> {
            self.queried.lock().unwrap().push(fiscal_code.to_string());
            self.companies
                .clone()
                .ok_or_else(|| AuthError::forbidden("denied"))
        }

        async fn ping(&self) -> AuthResult<()> {
            Ok(())
        }
    }

    struct StaticVault;

    #[async_trait]
    impl PersonalDataVault for StaticVault {
        async fn blur_user(&self, _user: &CommonTokenUser) -> AuthResult<String> {
            Ok("pdv-42".to_string())
        }
    }

    fn token_service() -> Arc<TokenService> {
        let backend = OpaqueTokenBackend::new(
            Arc::new(MemoryCache::new()),
            TokenTtl::fixed(Duration::from_secs(600)),
        );
        Arc::new(TokenService::new(Arc::new(backend), true))
    }

    fn endpoints() -> EndpointSettings {
        EndpointSettings {
            success: "https://app.example.it/success".to_string(),
            error: "https://app.example.it/error".to_string(),
        }
    }

    fn identity() -> SpidIdentity {
        SpidIdentity {
            fiscal_number: "TINIT-rssmra80a01h501u".to_string(),
            authn_context_class_ref: SpidLevel::L2.as_uri().to_string(),
            email: Some("mario.rossi@example.it".to_string()),
            name: Some("Mario".to_string()),
            family_name: Some("Rossi".to_string()),
            in_response_to: Some("_request-1".to_string()),
            ..Default::default()
        }
    }

    async fn stored_user(service: &TokenService, token: &str) -> TokenUser {
        service.introspect(token).await.unwrap().user.unwrap()
    }

    #[tokio::test]
    async fn test_consume_without_authority_issues_l1() {
        let service = token_service();
        let consumer = AssertionConsumer::new(service.clone(), endpoints());

        let outcome = consumer.consume(&identity()).await.unwrap();
        assert_eq!(outcome.level, TokenLevel::L1);
        assert_eq!(
            outcome.redirect_url,
            format!("https://app.example.it/success?token={}", outcome.token)
        );

        let user = stored_user(&service, &outcome.token).await;
        assert!(!user.from_aa());
        assert_eq!(user.common().fiscal_number, "RSSMRA80A01H501U");
    }

    #[tokio::test]
    async fn test_consume_single_company_issues_l2() {
        let service = token_service();
        let authority = StaticAuthority::returning(vec![company("12345678901")]);
        let consumer = AssertionConsumer::new(service.clone(), endpoints())
            .with_attribute_authority(authority.clone(), Some("https://app.example.it/select".into()));

        let outcome = consumer.consume(&identity()).await.unwrap();
        assert_eq!(outcome.level, TokenLevel::L2);
        assert!(outcome.redirect_url.starts_with("https://app.example.it/success?token="));
        assert_eq!(*authority.queried.lock().unwrap(), vec!["RSSMRA80A01H501U".to_string()]);
    }

    #[tokio::test]
    async fn test_consume_many_companies_redirects_to_l1_endpoint() {
        let authority =
            StaticAuthority::returning(vec![company("12345678901"), company("10987654321")]);
        let consumer = AssertionConsumer::new(token_service(), endpoints())
            .with_attribute_authority(authority, Some("https://app.example.it/select".into()));

        let outcome = consumer.consume(&identity()).await.unwrap();
        assert_eq!(outcome.level, TokenLevel::L1);
        assert!(outcome.redirect_url.starts_with("https://app.example.it/select?token="));
    }

    #[tokio::test]
    async fn test_consume_authority_denial_is_propagated() {
        let authority = Arc::new(StaticAuthority {
            companies: None,
            queried: Mutex::new(Vec::new()),
        });
        let consumer =
            AssertionConsumer::new(token_service(), endpoints()).with_attribute_authority(authority, None);

        let err = consumer.consume(&identity()).await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_consume_sets_vault_id() {
        let service = token_service();
        let consumer = AssertionConsumer::new(service.clone(), endpoints())
            .with_personal_data_vault(Arc::new(StaticVault));

        let outcome = consumer.consume(&identity()).await.unwrap();
        let user = stored_user(&service, &outcome.token).await;
        assert_eq!(user.common().id.as_deref(), Some("pdv-42"));
    }

    #[tokio::test]
    async fn test_consume_rejects_invalid_identity() {
        let consumer = AssertionConsumer::new(token_service(), endpoints());
        let mut input = identity();
        input.fiscal_number = "not-a-fiscal-code".to_string();

        let err = consumer.consume(&input).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation { .. }));
    }

    #[test]
    fn test_logout_and_error_redirects() {
        let consumer = AssertionConsumer::new(token_service(), endpoints());
        assert_eq!(
            consumer.logout_redirect().unwrap(),
            "https://app.example.it/success?logout"
        );
        assert_eq!(consumer.error_redirect(), "https://app.example.it/error");
    }
}
