//! Token user data model.
//!
//! A [`TokenUser`] is what a token stands for: the normalized SPID identity,
//! plus the companies (L1) or the single company (L2) the Attribute
//! Authority associated with the user. On the wire it is a flat JSON object
//! discriminated by the `level` field.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AuthError, AuthResult};

// ============================================================================
// SPID Level
// ============================================================================

/// SPID authentication level, in ascending assurance order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpidLevel {
    /// Single-factor authentication.
    #[serde(rename = "https://www.spid.gov.it/SpidL1")]
    L1,
    /// Two-factor authentication.
    #[serde(rename = "https://www.spid.gov.it/SpidL2")]
    L2,
    /// Two-factor authentication with a qualified device.
    #[serde(rename = "https://www.spid.gov.it/SpidL3")]
    L3,
}

impl SpidLevel {
    /// Returns the authentication context class reference URI.
    #[must_use]
    pub fn as_uri(&self) -> &'static str {
        match self {
            Self::L1 => "https://www.spid.gov.it/SpidL1",
            Self::L2 => "https://www.spid.gov.it/SpidL2",
            Self::L3 => "https://www.spid.gov.it/SpidL3",
        }
    }

    /// Parses an authentication context class reference URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri.trim() {
            "https://www.spid.gov.it/SpidL1" => Some(Self::L1),
            "https://www.spid.gov.it/SpidL2" => Some(Self::L2),
            "https://www.spid.gov.it/SpidL3" => Some(Self::L3),
            _ => None,
        }
    }
}

impl fmt::Display for SpidLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_uri())
    }
}

// ============================================================================
// Users and Companies
// ============================================================================

/// A company the user may act on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Certified email (PEC) of the company.
    pub email: String,
    /// Fiscal code of the organization.
    pub organization_fiscal_code: String,
    /// Display name of the organization.
    pub organization_name: String,
}

/// Identity fields shared by every token user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonTokenUser {
    /// Personal fiscal code, without the `TINIT-` prefix.
    pub fiscal_number: String,

    /// Level the user authenticated with.
    pub spid_level: SpidLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_phone: Option<String>,

    /// Pseudonymized id assigned by the Personal Data Vault.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A user holding an L1 token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUserL1 {
    #[serde(flatten)]
    pub common: CommonTokenUser,

    /// Whether the companies come from the Attribute Authority.
    pub from_aa: bool,

    /// Companies the user can choose from. Present iff `from_aa`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companies: Option<Vec<Company>>,
}

/// A user holding an L2 token, bound to one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUserL2 {
    #[serde(flatten)]
    pub common: CommonTokenUser,

    /// Whether the company comes from the Attribute Authority.
    pub from_aa: bool,

    /// The selected company. Present iff `from_aa`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
}

/// Token level discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenLevel {
    L1,
    L2,
}

impl TokenLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
        }
    }
}

impl fmt::Display for TokenLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user a token represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level")]
pub enum TokenUser {
    L1(TokenUserL1),
    L2(TokenUserL2),
}

impl TokenUser {
    /// Returns the token level.
    #[must_use]
    pub fn level(&self) -> TokenLevel {
        match self {
            Self::L1(_) => TokenLevel::L1,
            Self::L2(_) => TokenLevel::L2,
        }
    }

    /// Returns the shared identity fields.
    #[must_use]
    pub fn common(&self) -> &CommonTokenUser {
        match self {
            Self::L1(user) => &user.common,
            Self::L2(user) => &user.common,
        }
    }

    /// Returns `true` if the user data came from the Attribute Authority.
    #[must_use]
    pub fn from_aa(&self) -> bool {
        match self {
            Self::L1(user) => user.from_aa,
            Self::L2(user) => user.from_aa,
        }
    }

    /// Checks the `from_aa` / company invariant.
    ///
    /// # Errors
    /// Returns `AuthError::Validation` if the invariant does not hold.
    pub fn validate(&self) -> AuthResult<()> {
        match self {
            Self::L1(user) => match (&user.companies, user.from_aa) {
                (Some(companies), true) if !companies.is_empty() => Ok(()),
                (None, false) => Ok(()),
                (Some(_), true) => Err(AuthError::validation(
                    "L1 user from the Attribute Authority must have at least one company",
                )),
                (None, true) => Err(AuthError::validation(
                    "L1 user from the Attribute Authority must have companies",
                )),
                (Some(_), false) => Err(AuthError::validation(
                    "L1 user not from the Attribute Authority cannot have companies",
                )),
            },
            Self::L2(user) => match (&user.company, user.from_aa) {
                (Some(_), true) | (None, false) => Ok(()),
                (None, true) => Err(AuthError::validation(
                    "L2 user from the Attribute Authority must have a company",
                )),
                (Some(_), false) => Err(AuthError::validation(
                    "L2 user not from the Attribute Authority cannot have a company",
                )),
            },
        }
    }

    /// Decodes a user from arbitrary JSON.
    ///
    /// The `level` tag is read first, then the matching variant is decoded
    /// and its invariant checked. Unknown fields (e.g. JWT registered
    /// claims) are ignored.
    ///
    /// # Errors
    /// Returns `AuthError::Validation` describing the first failure.
    pub fn from_value(value: Value) -> AuthResult<Self> {
        let level = match value.get("level").and_then(Value::as_str) {
            Some("L1") => TokenLevel::L1,
            Some("L2") => TokenLevel::L2,
            Some(other) => {
                return Err(AuthError::validation(format!(
                    "Unknown token level '{other}'"
                )));
            }
            None => return Err(AuthError::validation("Missing token level")),
        };

        let user = match level {
            TokenLevel::L1 => serde_json::from_value::<TokenUserL1>(value).map(Self::L1),
            TokenLevel::L2 => serde_json::from_value::<TokenUserL2>(value).map(Self::L2),
        }
        .map_err(|e| AuthError::validation(format!("Invalid {level} token user: {e}")))?;

        user.validate()?;
        Ok(user)
    }

    /// Serializes the user to its flat JSON form.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if serialization fails.
    pub fn to_value(&self) -> AuthResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| AuthError::internal(format!("Cannot serialize token user: {e}")))
    }
}

impl From<TokenUserL1> for TokenUser {
    fn from(user: TokenUserL1) -> Self {
        Self::L1(user)
    }
}

impl From<TokenUserL2> for TokenUser {
    fn from(user: TokenUserL2) -> Self {
        Self::L2(user)
    }
}
