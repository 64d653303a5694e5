//! Grant store error types.
//!
//! Two layers of errors exist:
//!
//! - [`KvError`] is raised by a [`KeyValueStore`](crate::kv::KeyValueStore)
//!   backend (connection loss, rejected command, wrong value kind).
//! - [`GrantError`] is what the grant store surfaces to its callers.
//!
//! Backend errors on mutating operations never reach callers as `Err`; they
//! are reported through [`Outcome::Failed`](crate::outcome::Outcome::Failed).

use std::fmt;

/// Errors raised by a key-value backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KvError {
    /// Could not obtain or keep a connection to the backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// The backend rejected or failed to execute a command.
    #[error("Command error: {message}")]
    Command {
        /// Description of the command failure.
        message: String,
    },

    /// A key holds a value of a different kind than the operation expects.
    #[error("Wrong value kind for key: {key}")]
    WrongType {
        /// The offending key.
        key: String,
    },

    /// The operation did not complete in time.
    #[error("Timeout: {message}")]
    Timeout {
        /// Description of the timeout.
        message: String,
    },
}

impl KvError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Command` error.
    #[must_use]
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Creates a new `WrongType` error.
    #[must_use]
    pub fn wrong_type(key: impl Into<String>) -> Self {
        Self::WrongType { key: key.into() }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Returns `true` for failures caused by the transport rather than by
    /// the command itself.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Errors surfaced by the grant store.
#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    /// The caller passed a missing or empty identifier.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the violated precondition.
        message: String,
    },

    /// A grant could not be encoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the encoding failure.
        message: String,
    },

    /// A stored payload is not a valid grant encoding.
    #[error("Deserialization error: {message}")]
    Deserialization {
        /// Description of the decoding failure.
        message: String,
    },

    /// The backing store failed on a read path.
    #[error("Store error: {0}")]
    Store(#[from] KvError),

    /// The grant store configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl GrantError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new `Deserialization` error.
    #[must_use]
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization {
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

    /// Returns `true` if this is a validation error.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` if this error came from the backing store.
    #[must_use]
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Serialization { .. } | Self::Deserialization { .. } => ErrorCategory::Codec,
            Self::Store(_) => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}

/// Categories of grant store errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Caller misuse.
    Validation,
    /// Payload encoding or decoding.
    Codec,
    /// Backing store or transport.
    Infrastructure,
    /// Invalid configuration.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Codec => write!(f, "codec"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Type alias for grant store results.
pub type GrantResult<T> = Result<T, GrantError>;
