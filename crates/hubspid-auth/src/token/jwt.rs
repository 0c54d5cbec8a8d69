//! JWT signing and verification.
//!
//! Signed tokens carry the whole [`TokenUser`] as flat claims next to the
//! registered ones (`iss`, `aud`, `exp`, `iat`, `jti`, `sub`). Only RSA
//! algorithms are supported; the verification key is derived from the
//! configured private key.
//!
//! Expiry is checked without leeway everywhere, so a token is either
//! verifiable or has no remaining validity, never both.
//!
//! ## Example
//!
//! ```ignore
//! use hubspid_auth::token::jwt::{JwtService, SigningKeyPair, SigningAlgorithm};
//!
//! let key_pair = SigningKeyPair::from_private_pem(None, SigningAlgorithm::RS256, &pem)?;
//! let jwt = JwtService::new(key_pair, "https://hub-spid.example.it");
//!
//! let token = jwt.sign_user(&user, Duration::from_secs(3600), "01J0...")?;
//! let claims = jwt.verify(&token)?;
//! ```

use std::fmt;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::user::TokenUser;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while signing, reading or verifying a token.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// The claims could not be serialized or signed.
    #[error("Failed to sign token: {message}")]
    Signing { message: String },

    /// The token is not a well-formed JWT.
    #[error("Malformed token: {message}")]
    Malformed { message: String },

    #[error("Token expired")]
    Expired,

    #[error("Invalid signature")]
    InvalidSignature,

    /// Issuer, audience or not-before did not match.
    #[error("Claim rejected: {message}")]
    ClaimRejected { message: String },

    #[error("Missing required claim: {claim}")]
    MissingClaim { claim: String },

    /// The configured key cannot be used.
    #[error("Invalid key: {message}")]
    InvalidKey { message: String },
}

impl JwtError {
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn claim_rejected(message: impl Into<String>) -> Self {
        Self::ClaimRejected {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn missing_claim(claim: impl Into<String>) -> Self {
        Self::MissingClaim {
            claim: claim.into(),
        }
    }

    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        let message = err.to_string();
        match err.into_kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim { claim },
            ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience | ErrorKind::ImmatureSignature => {
                Self::claim_rejected(message)
            }
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => Self::invalid_key(message),
            _ => Self::malformed(message),
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// RSA signing algorithms accepted for gateway tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    RS256,
    RS384,
}

impl SigningAlgorithm {
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
        }
    }

    /// Name as used in the JWT `alg` header.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Registered Claims
// ============================================================================

/// Registered claims added to every signed token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisteredClaims {
    pub iss: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// The SAML request id when available.
    pub jti: String,

    /// The pseudonymized user id, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

// ============================================================================
// Signing Key Pair
// ============================================================================

/// The RSA key material behind a [`JwtService`].
pub struct SigningKeyPair {
    /// Key ID placed in the token header, if any.
    pub kid: Option<String>,

    pub algorithm: SigningAlgorithm,

    encoding_key: EncodingKey,

    decoding_key: DecodingKey,
}

impl SigningKeyPair {
    /// Loads a key pair from a PEM-encoded RSA private key (PKCS#8 or PKCS#1).
    ///
    /// # Errors
    /// Returns `JwtError::InvalidKey` if the PEM data is invalid.
    pub fn from_private_pem(
        kid: Option<String>,
        algorithm: SigningAlgorithm,
        private_pem: &str,
    ) -> Result<Self, JwtError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_pem))
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let public_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        Ok(Self {
            kid,
            algorithm,
            encoding_key,
            decoding_key,
        })
    }
}

// ============================================================================
// JWT Service
// ============================================================================

/// Signs and verifies user tokens. Shared across request tasks.
pub struct JwtService {
    signing_key: SigningKeyPair,
    issuer: String,
    audience: Option<String>,
}

impl JwtService {
    #[must_use]
    pub fn new(signing_key: SigningKeyPair, issuer: impl Into<String>) -> Self {
        Self {
            signing_key,
            issuer: issuer.into(),
            audience: None,
        }
    }

    /// Sets the `aud` claim placed in (and required from) tokens.
    #[must_use]
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    /// Encodes arbitrary claims into a JWT string.
    ///
    /// # Errors
    /// Returns `JwtError::Signing` if the claims cannot be signed.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let mut header = Header::new(self.signing_key.algorithm.to_jwt_algorithm());
        header.kid = self.signing_key.kid.clone();

        encode(&header, claims, &self.signing_key.encoding_key)
            .map_err(|e| JwtError::signing(e.to_string()))
    }

    /// Signs a token for `user`, valid for `ttl`.
    ///
    /// # Errors
    /// Returns `JwtError::Signing` if the user cannot be serialized or signed.
    pub fn sign_user(&self, user: &TokenUser, ttl: Duration, jti: &str) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let registered = RegisteredClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: now + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX - now),
            iat: now,
            jti: jti.to_string(),
            sub: user.common().id.clone(),
        };

        let claims = merge_claims(user, &registered)?;
        self.encode(&claims)
    }

    /// Verifies signature, issuer, audience and expiry, returning the claims.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, expired, or not ours.
    pub fn verify(&self, token: &str) -> Result<Value, JwtError> {
        let mut validation = strict_validation(self.signing_key.algorithm, &self.issuer);
        if let Some(audience) = &self.audience {
            validation.set_audience(&[audience]);
            validation.validate_aud = true;
        }

        decode::<Value>(token, &self.signing_key.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(JwtError::from)
    }
}

/// Issuer and expiry checks with no clock leeway. Audience is left to the caller.
fn strict_validation(algorithm: SigningAlgorithm, issuer: &str) -> Validation {
    let mut validation = Validation::new(algorithm.to_jwt_algorithm());
    validation.set_issuer(&[issuer]);
    validation.validate_exp = true;
    validation.validate_aud = false;
    validation.leeway = 0;
    validation
}

fn merge_claims(user: &TokenUser, registered: &RegisteredClaims) -> Result<Value, JwtError> {
    let user_value = serde_json::to_value(user).map_err(|e| JwtError::signing(e.to_string()))?;
    let registered_value =
        serde_json::to_value(registered).map_err(|e| JwtError::signing(e.to_string()))?;

    let (Value::Object(mut claims), Value::Object(registered)) = (user_value, registered_value)
    else {
        return Err(JwtError::signing("Token user is not a JSON object"));
    };
    claims.extend(registered);
    Ok(Value::Object(claims))
}

// ============================================================================
// Unverified Inspection
// ============================================================================

/// Decodes the payload of a JWT without verifying its signature.
///
/// Only use the result for data whose authenticity does not matter.
///
/// # Errors
/// Returns `JwtError::Malformed` if the token is not a three-part JWT
/// with a JSON object payload.
pub fn extract_raw_data(token: &str) -> Result<Map<String, Value>, JwtError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(JwtError::malformed("Token is not a JWT"));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| JwtError::malformed(format!("Invalid payload encoding: {e}")))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(JwtError::malformed("Payload is not a JSON object")),
        Err(e) => Err(JwtError::malformed(format!("Invalid payload: {e}"))),
    }
}

/// Returns the number of seconds until the token expires, without
/// verifying it.
///
/// # Errors
/// Returns `JwtError::MissingClaim` without a numeric `exp`, and
/// `JwtError::Expired` when the token is already expired.
pub fn extract_remaining_validity(token: &str) -> Result<u64, JwtError> {
    remaining_validity(&extract_raw_data(token)?)
}

/// Seconds left before the `exp` claim of already-decoded claims.
///
/// # Errors
/// Same as [`extract_remaining_validity`].
pub fn remaining_validity(claims: &Map<String, Value>) -> Result<u64, JwtError> {
    let exp = claims
        .get("exp")
        .and_then(Value::as_i64)
        .ok_or_else(|| JwtError::missing_claim("exp"))?;

    let now = OffsetDateTime::now_utc().unix_timestamp();
    if exp <= now {
        return Err(JwtError::Expired);
    }
    u64::try_from(exp - now).map_err(|e| JwtError::claim_rejected(e.to_string()))
}

/// Verifies a token against a public key, checking signature, issuer and expiry.
///
/// # Errors
/// Returns an error if the key is invalid or the token does not verify.
pub fn verify_token(
    public_key_pem: &str,
    algorithm: SigningAlgorithm,
    token: &str,
    issuer: &str,
) -> Result<Value, JwtError> {
    let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .map_err(|e| JwtError::invalid_key(e.to_string()))?;

    decode::<Value>(token, &decoding_key, &strict_validation(algorithm, issuer))
        .map(|data| data.claims)
        .map_err(JwtError::from)
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod tests {
    use super::test_keys::*;
    use super::*;
    use crate::user::fixtures::{l1_user_from_aa, l1_user_without_aa};
    use serde_json::json;

    #[test]
    fn test_from_private_pem_rejects_garbage() {
        let result = SigningKeyPair::from_private_pem(None, SigningAlgorithm::RS256, "not a key");
        assert!(matches!(result, Err(JwtError::InvalidKey { .. })));
    }

    #[test]
    fn test_from_private_pem_keeps_kid_and_algorithm() {
        let key_pair =
            SigningKeyPair::from_private_pem(None, SigningAlgorithm::RS384, private_pem()).unwrap();
        assert_eq!(key_pair.algorithm, SigningAlgorithm::RS384);
        assert!(key_pair.kid.is_none());
    }

    #[test]
    fn test_sign_and_verify_user() {
        let service = jwt_service();
        let user = TokenUser::from(l1_user_from_aa());

        let token = service
            .sign_user(&user, Duration::from_secs(3600), "_req-42")
            .unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims["iss"], ISSUER);
        assert_eq!(claims["jti"], "_req-42");
        assert_eq!(claims["level"], "L1");
        assert_eq!(claims["fiscal_number"], "RSSMRA80A01H501U");
        assert!(claims.get("aud").is_none());
        assert!(claims.get("sub").is_none());

        let decoded = TokenUser::from_value(claims).unwrap();
        assert_eq!(decoded, user);
    }

    #[test]
    fn test_header_carries_kid() {
        let service = jwt_service();
        let token = service
            .sign_user(&TokenUser::from(l1_user_without_aa()), Duration::from_secs(60), "j")
            .unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("test-kid"));
        assert_eq!(header.alg, Algorithm::RS256);
    }

    #[test]
    fn test_sub_is_pseudonymized_id() {
        let service = jwt_service();
        let mut user = l1_user_without_aa();
        user.common.id = Some("pdv-123".to_string());

        let token = service
            .sign_user(&TokenUser::from(user), Duration::from_secs(60), "j")
            .unwrap();
        let claims = service.verify(&token).unwrap();
        assert_eq!(claims["sub"], "pdv-123");
    }

    #[test]
    fn test_audience_enforced() {
        let service = jwt_service().with_audience(Some("https://portal.example.it".into()));
        let token = service
            .sign_user(&TokenUser::from(l1_user_without_aa()), Duration::from_secs(60), "j")
            .unwrap();
        let claims = service.verify(&token).unwrap();
        assert_eq!(claims["aud"], "https://portal.example.it");

        let other = jwt_service().with_audience(Some("https://other.example.it".into()));
        assert!(matches!(
            other.verify(&token),
            Err(JwtError::ClaimRejected { .. })
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = jwt_service();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let token = service
            .encode(&json!({
                "iss": ISSUER,
                "exp": now - 3600,
                "iat": now - 7200,
                "jti": "old",
            }))
            .unwrap();

        assert!(matches!(service.verify(&token), Err(JwtError::Expired)));
        assert!(matches!(
            extract_remaining_validity(&token),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_recently_expired_token_gets_no_leeway() {
        let token = token_expiring_in(&TokenUser::from(l1_user_from_aa()), -30);

        assert!(matches!(jwt_service().verify(&token), Err(JwtError::Expired)));
        assert!(matches!(
            verify_token(&public_pem(), SigningAlgorithm::RS256, &token, ISSUER),
            Err(JwtError::Expired)
        ));
        assert!(matches!(
            extract_remaining_validity(&token),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let service = JwtService::new(key_pair(), "https://someone-else.example.it");
        let token = service
            .sign_user(&TokenUser::from(l1_user_without_aa()), Duration::from_secs(60), "j")
            .unwrap();

        assert!(matches!(
            jwt_service().verify(&token),
            Err(JwtError::ClaimRejected { .. })
        ));
    }

    #[test]
    fn test_invalid_signature_rejected() {
        let token = foreign_jwt_service(ISSUER)
            .sign_user(&TokenUser::from(l1_user_without_aa()), Duration::from_secs(60), "j")
            .unwrap();

        assert!(matches!(
            jwt_service().verify(&token),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_extract_raw_data_without_verification() {
        let token = foreign_jwt_service("https://unknown.example.it")
            .sign_user(&TokenUser::from(l1_user_without_aa()), Duration::from_secs(60), "j")
            .unwrap();

        let claims = extract_raw_data(&token).unwrap();
        assert_eq!(claims["iss"], "https://unknown.example.it");
        assert_eq!(claims["level"], "L1");
    }

    #[test]
    fn test_extract_raw_data_malformed() {
        assert!(extract_raw_data("abc").is_err());
        assert!(extract_raw_data("a.b.c.d").is_err());
        assert!(extract_raw_data("a.!!!.c").is_err());

        let not_object = format!("h.{}.s", URL_SAFE_NO_PAD.encode(b"[1,2]"));
        assert!(matches!(
            extract_raw_data(&not_object),
            Err(JwtError::Malformed { .. })
        ));
    }

    #[test]
    fn test_remaining_validity() {
        let service = jwt_service();
        let token = service
            .sign_user(&TokenUser::from(l1_user_without_aa()), Duration::from_secs(600), "j")
            .unwrap();

        let remaining = extract_remaining_validity(&token).unwrap();
        assert!(remaining > 590 && remaining <= 600);
    }

    #[test]
    fn test_remaining_validity_requires_exp() {
        let payload = URL_SAFE_NO_PAD.encode(b"{\"iss\":\"x\"}");
        let token = format!("h.{payload}.s");
        assert!(matches!(
            extract_remaining_validity(&token),
            Err(JwtError::MissingClaim { .. })
        ));
    }

    #[test]
    fn test_verify_token_with_public_key() {
        let token = jwt_service()
            .sign_user(&TokenUser::from(l1_user_without_aa()), Duration::from_secs(60), "j")
            .unwrap();

        let claims = verify_token(&public_pem(), SigningAlgorithm::RS256, &token, ISSUER).unwrap();
        assert_eq!(claims["jti"], "j");

        assert!(
            verify_token(
                &public_pem(),
                SigningAlgorithm::RS256,
                &token,
                "https://wrong.example.it",
            )
            .is_err()
        );
    }
}
