//! Cache error types.

use crate::key_namespace;

/// Errors raised by the cache primitive layer.
///
/// Every falsy-but-successful backend reply is surfaced as one of these
/// variants, so callers never have to inspect raw replies.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No connection to the backend could be obtained.
    #[error("Cache connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// The backend returned an error for a command.
    #[error("Cache command {command} failed: {message}")]
    Command {
        /// The command that failed (e.g. `SET`).
        command: &'static str,
        /// Backend error message.
        message: String,
    },

    /// The backend replied with a value of an unexpected shape.
    #[error("Unexpected reply to {command}: {reply}")]
    UnexpectedReply {
        /// The command that produced the reply.
        command: &'static str,
        /// Debug rendering of the reply.
        reply: String,
    },

    /// The backend acknowledged the command with a falsy reply.
    #[error("Cache rejected {command} in namespace {namespace}")]
    Rejected {
        /// The rejected command.
        command: &'static str,
        /// Namespace of the key involved; keys may embed tokens.
        namespace: String,
    },

    /// A write was requested with a zero expiration.
    #[error("Invalid expiration in namespace {namespace}: ttl must be greater than zero")]
    InvalidExpiration {
        /// Namespace of the key involved.
        namespace: String,
    },
}

impl CacheError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Command` error.
    #[must_use]
    pub fn command(command: &'static str, message: impl ToString) -> Self {
        Self::Command {
            command,
            message: message.to_string(),
        }
    }

    /// Creates a new `UnexpectedReply` error.
    #[must_use]
    pub fn unexpected_reply(command: &'static str, reply: impl std::fmt::Debug) -> Self {
        Self::UnexpectedReply {
            command,
            reply: format!("{reply:?}"),
        }
    }

    /// Creates a new `Rejected` error.
    #[must_use]
    pub fn rejected(command: &'static str, key: &str) -> Self {
        Self::Rejected {
            command,
            namespace: key_namespace(key).to_string(),
        }
    }

    /// Creates a new `InvalidExpiration` error.
    #[must_use]
    pub fn invalid_expiration(key: &str) -> Self {
        Self::InvalidExpiration {
            namespace: key_namespace(key).to_string(),
        }
    }

    /// Returns `true` if the backend could not be reached at all.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::connection(err.to_string())
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
