//! Gateway error types.
//!
//! Every failure in identity normalization, token handling, and the
//! external adapters is expressed as an [`AuthError`]. Each variant maps to
//! one HTTP status and one stable error tag, so handlers never have to
//! inspect messages to pick a response.

use std::fmt;

use axum::http::StatusCode;
use hubspid_cache::CacheError;

use crate::token::jwt::JwtError;

/// Message returned when an upgrade is attempted on a token that was not
/// issued from Attribute Authority data.
pub const NOT_AUTHORITY_GRANTED_MESSAGE: &str =
    "Cannot upgrade a token not granted by an Authorization Authority";

/// Errors that can occur while issuing, inspecting, or upgrading tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The input failed validation (bad identity, malformed body, wrong token kind).
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// A referenced resource does not exist (token, organization).
    #[error("Not found: {message}")]
    NotFound {
        /// Description of what is missing.
        message: String,
    },

    /// The caller is not allowed to obtain a token.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of why access is forbidden.
        message: String,
    },

    /// Upgrade requested for a token that did not come from the Attribute Authority.
    #[error("Cannot upgrade a token not granted by an Authorization Authority")]
    NotAuthorityGranted,

    /// The session cache failed.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// A token could not be signed.
    #[error("Signing error: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },

    /// An external service (Attribute Authority, Personal Data Vault) failed.
    #[error("Upstream error: {service} - {message}")]
    Upstream {
        /// Name of the failing service.
        service: String,
        /// Description of the failure.
        message: String,
    },

    /// The gateway configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `Upstream` error.
    #[must_use]
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::NotFound { .. } | Self::Forbidden { .. }
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns the HTTP status this error is reported with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::NotAuthorityGranted
            | Self::Cache(_)
            | Self::Signing { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the stable tag used in the `error` field of response bodies.
    #[must_use]
    pub fn error_tag(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "Bad Request",
            Self::NotFound { .. } => "Not Found",
            Self::Forbidden { .. } => "Forbidden",
            Self::Upstream { .. } => "Bad Gateway",
            Self::NotAuthorityGranted
            | Self::Cache(_)
            | Self::Signing { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => "Internal Server Error",
        }
    }

    /// Returns the message safe to show to callers.
    ///
    /// Cache and configuration internals are replaced with a generic text.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Validation { message }
            | Self::NotFound { message }
            | Self::Forbidden { message }
            | Self::Signing { message }
            | Self::Internal { message } => message.clone(),
            Self::NotAuthorityGranted => NOT_AUTHORITY_GRANTED_MESSAGE.to_string(),
            Self::Cache(_) => "Session store unavailable".to_string(),
            Self::Upstream { service, .. } => format!("{service} request failed"),
            Self::Configuration { .. } => "Gateway misconfigured".to_string(),
        }
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::Validation,
            Self::Forbidden { .. } => ErrorCategory::Authorization,
            Self::NotAuthorityGranted => ErrorCategory::Authorization,
            Self::Cache(_) => ErrorCategory::Infrastructure,
            Self::Signing { .. } => ErrorCategory::Token,
            Self::Upstream { .. } => ErrorCategory::Federation,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match &err {
            JwtError::InvalidKey { .. } => Self::configuration(err.to_string()),
            JwtError::Signing { .. } => Self::signing(err.to_string()),
            _ => Self::validation(err.to_string()),
        }
    }
}

/// Categories of gateway errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Permission checks (Attribute Authority denial, upgrade refusal).
    Authorization,
    /// Token signing and verification.
    Token,
    /// Request validation errors.
    Validation,
    /// Session cache failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
    /// External service failures.
    Federation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authorization => write!(f, "authorization"),
            Self::Token => write!(f, "token"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
            Self::Federation => write!(f, "federation"),
        }
    }
}

/// Result type for gateway operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::not_found("Token not found");
        assert_eq!(err.to_string(), "Not found: Token not found");

        let err = AuthError::NotAuthorityGranted;
        assert_eq!(err.to_string(), NOT_AUTHORITY_GRANTED_MESSAGE);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AuthError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::NotAuthorityGranted.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::upstream("attribute-authority", "timeout").status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_detail_hides_internals() {
        let err = AuthError::from(CacheError::connection("redis://secret@host refused"));
        assert_eq!(err.detail(), "Session store unavailable");
        assert!(err.is_server_error());

        let err = AuthError::validation("Invalid fiscal code");
        assert_eq!(err.detail(), "Invalid fiscal code");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_jwt_error_conversion() {
        assert!(matches!(
            AuthError::from(JwtError::Expired),
            AuthError::Validation { .. }
        ));
        assert!(matches!(
            AuthError::from(JwtError::invalid_key("bad pem")),
            AuthError::Configuration { .. }
        ));
        assert!(matches!(
            AuthError::from(JwtError::signing("boom")),
            AuthError::Signing { .. }
        ));
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            AuthError::forbidden("x").category(),
            ErrorCategory::Authorization
        );
        assert_eq!(ErrorCategory::Federation.to_string(), "federation");
    }
}
