//! Attribute Authority adapter.
//!
//! The Attribute Authority tells which companies a person may represent.
//! Its answer drives the L1/L2 decision at login.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::config::AttributeAuthoritySettings;
use crate::error::{AuthError, AuthResult};
use crate::identity::is_organization_fiscal_code;
use crate::user::Company;

const SERVICE: &str = "attribute-authority";

/// Looks up the companies related to a person.
#[async_trait]
pub trait AttributeAuthority: Send + Sync {
    /// Returns the companies of the person with `fiscal_code`.
    ///
    /// # Errors
    /// Returns `AuthError::Forbidden` when the authority denies the lookup or
    /// finds no company, and `AuthError::Upstream` on transport or decoding
    /// failures.
    async fn user_companies(&self, fiscal_code: &str) -> AuthResult<Vec<Company>>;

    /// Liveness probe.
    async fn ping(&self) -> AuthResult<()>;
}

/// Company as returned by the authority API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCompany {
    fiscal_code: String,
    organization_name: String,
    pec: String,
}

impl ApiCompany {
    fn into_company(self) -> AuthResult<Company> {
        if !is_organization_fiscal_code(&self.fiscal_code) {
            return Err(AuthError::upstream(
                SERVICE,
                format!("invalid organization fiscal code '{}'", self.fiscal_code),
            ));
        }
        if self.organization_name.trim().is_empty() || !self.pec.contains('@') {
            return Err(AuthError::upstream(SERVICE, "incomplete company record"));
        }
        Ok(Company {
            email: self.pec,
            organization_fiscal_code: self.fiscal_code,
            organization_name: self.organization_name,
        })
    }
}

/// HTTP client for the Attribute Authority.
pub struct HttpAttributeAuthority {
    client: reqwest::Client,
    endpoint: Url,
    ping_endpoint: Url,
    method: Method,
}

impl HttpAttributeAuthority {
    /// Creates a client from configuration.
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` for malformed URLs or methods.
    pub fn from_settings(settings: &AttributeAuthoritySettings) -> AuthResult<Self> {
        let endpoint = Url::parse(&settings.api_endpoint).map_err(|e| {
            AuthError::configuration(format!("attribute_authority.api_endpoint: {e}"))
        })?;
        let ping_endpoint = match &settings.ping_endpoint {
            Some(url) => Url::parse(url),
            None => endpoint.join("ping"),
        }
        .map_err(|e| AuthError::configuration(format!("attribute_authority.ping_endpoint: {e}")))?;
        let method = Method::from_bytes(settings.api_method.to_ascii_uppercase().as_bytes())
            .map_err(|e| AuthError::configuration(format!("attribute_authority.api_method: {e}")))?;

        Self::new(endpoint, ping_endpoint, method, settings.timeout)
    }

    /// Creates a client for explicit endpoints.
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` if the HTTP client cannot be built.
    pub fn new(endpoint: Url, ping_endpoint: Url, method: Method, timeout: Duration) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            ping_endpoint,
            method,
        })
    }
}

#[async_trait]
impl AttributeAuthority for HttpAttributeAuthority {
    async fn user_companies(&self, fiscal_code: &str) -> AuthResult<Vec<Company>> {
        let response = self
            .client
            .request(self.method.clone(), self.endpoint.clone())
            .json(&serde_json::json!({ "fiscalCode": fiscal_code }))
            .send()
            .await
            .map_err(|e| AuthError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(status = %status, "Attribute Authority denied the lookup");
            return Err(AuthError::forbidden("User not authorized by the Attribute Authority"));
        }

        let companies: Vec<ApiCompany> = response
            .json()
            .await
            .map_err(|e| AuthError::upstream(SERVICE, format!("invalid response body: {e}")))?;

        if companies.is_empty() {
            return Err(AuthError::forbidden("User is not related to any company"));
        }

        let companies = companies
            .into_iter()
            .map(ApiCompany::into_company)
            .collect::<AuthResult<Vec<_>>>()?;
        tracing::debug!(count = companies.len(), "Companies resolved");
        Ok(companies)
    }

    async fn ping(&self) -> AuthResult<()> {
        let response = self
            .client
            .get(self.ping_endpoint.clone())
            .send()
            .await
            .map_err(|e| AuthError::upstream(SERVICE, e.to_string()))?;

        if response.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(AuthError::upstream(
                SERVICE,
                format!("ping returned {}", response.status()),
            ))
        }
    }
}
