//! Identity normalization.
//!
//! Turns the attributes released by a SPID identity provider into a
//! [`CommonTokenUser`], and decides between an L1 and an L2 token from the
//! companies the Attribute Authority returned.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::user::{CommonTokenUser, Company, SpidLevel, TokenUser, TokenUserL1, TokenUserL2};

/// Prefix identity providers put in front of the fiscal number.
pub const FISCAL_NUMBER_PREFIX: &str = "TINIT-";

static FISCAL_CODE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Z]{6}[0-9LMNPQRSTUV]{2}[ABCDEHLMPRST][0-9LMNPQRSTUV]{2}[A-Z][0-9LMNPQRSTUV]{3}[A-Z]$",
    )
    .expect("Invalid fiscal code regex")
});

static ORGANIZATION_FISCAL_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{11}$").expect("Invalid organization fiscal code regex"));

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email regex"));

/// Identity attributes handed over by the SAML layer after it validated
/// the assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpidIdentity {
    /// Fiscal number, usually with the `TINIT-` prefix.
    pub fiscal_number: String,

    /// Authentication context class reference (the SPID level URI).
    pub authn_context_class_ref: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub family_name: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub mobile_phone: Option<String>,

    /// Id of the authentication request this assertion answers.
    #[serde(default)]
    pub in_response_to: Option<String>,

    /// Raw assertion, kept for auditing by the caller.
    #[serde(default, skip_serializing)]
    pub assertion_xml: Option<String>,
}

/// Returns `true` if `code` is a well-formed Italian personal fiscal code.
#[must_use]
pub fn is_fiscal_code(code: &str) -> bool {
    FISCAL_CODE_REGEX.is_match(code)
}

/// Returns `true` if `code` is a well-formed organization fiscal code.
#[must_use]
pub fn is_organization_fiscal_code(code: &str) -> bool {
    ORGANIZATION_FISCAL_CODE_REGEX.is_match(code)
}

/// Strips the `TINIT-` prefix, if present.
#[must_use]
pub fn strip_fiscal_number_prefix(fiscal_number: &str) -> &str {
    fiscal_number
        .strip_prefix(FISCAL_NUMBER_PREFIX)
        .unwrap_or(fiscal_number)
}

fn non_empty(field: &str, value: &Option<String>) -> AuthResult<Option<String>> {
    match value {
        Some(v) if v.trim().is_empty() => Err(AuthError::validation(format!(
            "Field '{field}' cannot be empty"
        ))),
        Some(v) => Ok(Some(v.trim().to_string())),
        None => Ok(None),
    }
}

/// Normalizes a SPID identity into the common token user fields.
///
/// # Errors
/// Returns `AuthError::Validation` if the fiscal number, SPID level, or any
/// optional attribute is malformed.
pub fn to_common_token_user(identity: &SpidIdentity) -> AuthResult<CommonTokenUser> {
    let fiscal_number = strip_fiscal_number_prefix(identity.fiscal_number.trim()).to_uppercase();
    if !is_fiscal_code(&fiscal_number) {
        return Err(AuthError::validation("Invalid fiscal number"));
    }

    let spid_level = SpidLevel::from_uri(&identity.authn_context_class_ref).ok_or_else(|| {
        AuthError::validation(format!(
            "Invalid SPID level '{}'",
            identity.authn_context_class_ref
        ))
    })?;

    let email = non_empty("email", &identity.email)?;
    if let Some(ref email) = email {
        if !EMAIL_REGEX.is_match(email) {
            return Err(AuthError::validation("Invalid email"));
        }
    }

    Ok(CommonTokenUser {
        fiscal_number,
        spid_level,
        email,
        family_name: non_empty("familyName", &identity.family_name)?,
        name: non_empty("name", &identity.name)?,
        mobile_phone: non_empty("mobilePhone", &identity.mobile_phone)?,
        id: None,
    })
}

/// Projects an L1 user onto one of its companies.
#[must_use]
pub fn to_token_user_l2(user: &TokenUserL1, company: Company) -> TokenUserL2 {
    TokenUserL2 {
        common: user.common.clone(),
        from_aa: user.from_aa,
        company: Some(company),
    }
}

/// Chooses the token user from the Attribute Authority result.
///
/// - `None` (lookup disabled): L1, not from the Attribute Authority
/// - no companies: forbidden
/// - exactly one company: L2 bound to it
/// - several companies: L1 carrying all of them
///
/// # Errors
/// Returns `AuthError::Forbidden` when the lookup produced no company.
pub fn resolve_token_user(
    common: CommonTokenUser,
    companies: Option<Vec<Company>>,
) -> AuthResult<TokenUser> {
    let Some(mut companies) = companies else {
        return Ok(TokenUser::L1(TokenUserL1 {
            common,
            from_aa: false,
            companies: None,
        }));
    };

    match companies.len() {
        0 => Err(AuthError::forbidden("User is not related to any company")),
        1 => {
            let company = companies.remove(0);
            Ok(TokenUser::L2(TokenUserL2 {
                common,
                from_aa: true,
                company: Some(company),
            }))
        }
        _ => Ok(TokenUser::L1(TokenUserL1 {
            common,
            from_aa: true,
            companies: Some(companies),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::TokenLevel;
    use crate::user::fixtures::{common_user, company, l1_user_from_aa};

    fn identity() -> SpidIdentity {
        SpidIdentity {
            fiscal_number: "TINIT-RSSMRA80A01H501U".to_string(),
            authn_context_class_ref: "https://www.spid.gov.it/SpidL2".to_string(),
            email: Some("mario.rossi@example.it".to_string()),
            family_name: Some("Rossi".to_string()),
            name: Some("Mario".to_string()),
            mobile_phone: None,
            in_response_to: Some("_req-1".to_string()),
            assertion_xml: None,
        }
    }

    #[test]
    fn test_strips_prefix() {
        let user = to_common_token_user(&identity()).unwrap();
        assert_eq!(user.fiscal_number, "RSSMRA80A01H501U");
        assert_eq!(user.spid_level, SpidLevel::L2);
        assert_eq!(user.name.as_deref(), Some("Mario"));
        assert!(user.id.is_none());
    }

    #[test]
    fn test_accepts_unprefixed_fiscal_number() {
        let mut input = identity();
        input.fiscal_number = "RSSMRA80A01H501U".to_string();
        assert!(to_common_token_user(&input).is_ok());
    }

    #[test]
    fn test_rejects_invalid_fiscal_number() {
        let mut input = identity();
        input.fiscal_number = "TINIT-NOTAFISCALCODE".to_string();
        let err = to_common_token_user(&input).unwrap_err();
        assert!(matches!(err, AuthError::Validation { .. }));
    }

    #[test]
    fn test_rejects_unknown_level() {
        let mut input = identity();
        input.authn_context_class_ref = "urn:oasis:names:tc:SAML:2.0:ac:classes:Password".into();
        assert!(to_common_token_user(&input).is_err());
    }

    #[test]
    fn test_rejects_bad_optional_fields() {
        let mut input = identity();
        input.email = Some("not-an-email".to_string());
        assert!(to_common_token_user(&input).is_err());

        let mut input = identity();
        input.name = Some("   ".to_string());
        assert!(to_common_token_user(&input).is_err());
    }

    #[test]
    fn test_resolve_without_attribute_authority() {
        let user = resolve_token_user(common_user(), None).unwrap();
        assert_eq!(user.level(), TokenLevel::L1);
        assert!(!user.from_aa());
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_resolve_no_companies_is_forbidden() {
        let err = resolve_token_user(common_user(), Some(vec![])).unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { .. }));
    }

    #[test]
    fn test_resolve_single_company_is_l2() {
        let user = resolve_token_user(common_user(), Some(vec![company("12345678901")])).unwrap();
        match user {
            TokenUser::L2(l2) => {
                assert!(l2.from_aa);
                assert_eq!(
                    l2.company.unwrap().organization_fiscal_code,
                    "12345678901"
                );
            }
            TokenUser::L1(_) => panic!("expected L2"),
        }
    }

    #[test]
    fn test_resolve_many_companies_is_l1() {
        let companies = vec![company("12345678901"), company("10987654321")];
        let user = resolve_token_user(common_user(), Some(companies)).unwrap();
        match user {
            TokenUser::L1(l1) => assert_eq!(l1.companies.unwrap().len(), 2),
            TokenUser::L2(_) => panic!("expected L1"),
        }
    }

    #[test]
    fn test_to_token_user_l2_keeps_identity() {
        let l1 = l1_user_from_aa();
        let l2 = to_token_user_l2(&l1, company("10987654321"));
        assert_eq!(l2.common, l1.common);
        assert!(l2.from_aa);
        assert!(TokenUser::L2(l2).validate().is_ok());
    }

    #[test]
    fn test_organization_fiscal_code() {
        assert!(is_organization_fiscal_code("12345678901"));
        assert!(!is_organization_fiscal_code("1234567890"));
        assert!(!is_organization_fiscal_code("RSSMRA80A01H501U"));
    }
}
