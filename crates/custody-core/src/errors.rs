//! Unified error system for custody collaborators
//!
//! Every collaborator interface (server clients, DAOs, hardware transport,
//! encryptor) reports failures through this single type. Component crates wrap
//! it in their own typed errors with step and factor context.

use serde::{Deserialize, Serialize};

/// Unified error type for collaborator operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CustodyError {
    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Cryptographic operation failed
    #[error("Crypto error: {message}")]
    Crypto {
        /// Error message describing the cryptographic failure
        message: String,
    },

    /// Network or backend error
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Storage operation failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// Operation was cancelled by the user or an enclosing flow
    #[error("Cancelled: {message}")]
    Cancelled {
        /// What was cancelled
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl CustodyError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Map this error onto the recovery error taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Invalid { .. } | Self::Internal { .. } => ErrorClass::Internal,
            Self::NotFound { .. } => ErrorClass::MissingSecret,
            Self::Crypto { .. } | Self::Serialization { .. } => ErrorClass::Format,
            Self::Network { .. } => ErrorClass::Network,
            Self::Storage { .. } => ErrorClass::Storage,
            Self::Cancelled { .. } => ErrorClass::Cancelled,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }
}

/// Coarse classification used by callers to pick retry-vs-abort behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Caller logic error, e.g. "recovery not in progress". Never retried automatically.
    Precondition,
    /// Bad payload (backup JSON, descriptor shape). Retrying will not help.
    Format,
    /// A sealed secret is missing locally; recover it through the hardware.
    MissingSecret,
    /// Local persistence failed; only the write may be retried.
    Storage,
    /// Backend or transport failure; safe to retry without losing progress.
    Network,
    /// The user left the flow.
    Cancelled,
    /// Programming or invariant error.
    Internal,
}

impl ErrorClass {
    /// Only network failures are retryable as-is.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network)
    }
}

/// Standard Result type for collaborator operations
pub type CustodyResult<T> = std::result::Result<T, CustodyError>;

impl From<serde_json::Error> for CustodyError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for CustodyError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::storage(err.to_string()),
        }
    }
}
