//! Personal Data Vault adapter.
//!
//! The vault replaces the fiscal code with a pseudonymous id before tokens
//! are issued. Users are looked up first and registered on a miss.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::UserRegistrySettings;
use crate::error::{AuthError, AuthResult};
use crate::user::CommonTokenUser;

const SERVICE: &str = "personal-data-vault";
const API_KEY_HEADER: &str = "x-api-key";

/// Pseudonymizes users.
#[async_trait]
pub trait PersonalDataVault: Send + Sync {
    /// Returns the vault id of `user`, registering the user if needed.
    ///
    /// # Errors
    /// Returns `AuthError::Upstream` if the vault cannot be reached or
    /// answers unexpectedly.
    async fn blur_user(&self, user: &CommonTokenUser) -> AuthResult<String>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CertifiedField<'a> {
    certification: &'static str,
    value: &'a str,
}

impl<'a> CertifiedField<'a> {
    fn spid(value: &'a str) -> Self {
        Self {
            certification: "SPID",
            value,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewUser<'a> {
    fiscal_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<CertifiedField<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    family_name: Option<CertifiedField<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<CertifiedField<'a>>,
}

impl<'a> NewUser<'a> {
    fn from_user(user: &'a CommonTokenUser) -> Self {
        Self {
            fiscal_code: &user.fiscal_number,
            name: user.name.as_deref().map(CertifiedField::spid),
            family_name: user.family_name.as_deref().map(CertifiedField::spid),
            email: user.email.as_deref().map(CertifiedField::spid),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserId {
    id: String,
}

/// HTTP client for the Personal Data Vault.
pub struct HttpPersonalDataVault {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPersonalDataVault {
    /// Creates a client from configuration.
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` if the HTTP client cannot be built.
    pub fn from_settings(settings: &UserRegistrySettings) -> AuthResult<Self> {
        Self::new(&settings.url, &settings.api_key, settings.timeout)
    }

    /// Creates a client for an explicit base URL.
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn find_user_id(&self, fiscal_code: &str) -> AuthResult<Option<String>> {
        let response = self
            .client
            .post(format!("{}/users/search", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&serde_json::json!({ "fiscalCode": fiscal_code }))
            .send()
            .await
            .map_err(|e| AuthError::upstream(SERVICE, e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let user: UserId = response
                    .json()
                    .await
                    .map_err(|e| AuthError::upstream(SERVICE, format!("invalid lookup body: {e}")))?;
                Ok(Some(user.id))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(AuthError::upstream(
                SERVICE,
                format!("lookup returned {status}"),
            )),
        }
    }

    async fn create_user(&self, user: &CommonTokenUser) -> AuthResult<String> {
        let response = self
            .client
            .post(format!("{}/users", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&NewUser::from_user(user))
            .send()
            .await
            .map_err(|e| AuthError::upstream(SERVICE, e.to_string()))?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => {
                let created: UserId = response
                    .json()
                    .await
                    .map_err(|e| AuthError::upstream(SERVICE, format!("invalid create body: {e}")))?;
                Ok(created.id)
            }
            status => Err(AuthError::upstream(
                SERVICE,
                format!("create returned {status}"),
            )),
        }
    }
}

#[async_trait]
impl PersonalDataVault for HttpPersonalDataVault {
    async fn blur_user(&self, user: &CommonTokenUser) -> AuthResult<String> {
        if let Some(id) = self.find_user_id(&user.fiscal_number).await? {
            return Ok(id);
        }
        let id = self.create_user(user).await?;
        tracing::info!("User registered in the Personal Data Vault");
        Ok(id)
    }
}
