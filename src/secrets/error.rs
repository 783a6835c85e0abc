//! Error types for secret store operations.

use thiserror::Error;

/// Result type for secret store operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors that can occur while talking to a secret store.
///
/// "Nothing stored at this key" is not an error; stores answer `Ok(None)` instead.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// Failed to connect to the secret store.
    #[error("Backend connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Authentication with the secret store failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The store rejected or failed an operation on a key.
    #[error("Backend error on '{key}': {message}")]
    BackendError { key: String, message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SecretsError {
    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: message.into() }
    }

    /// Create an authentication failed error.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: message.into() }
    }

    /// Create a backend error for the given key.
    pub fn backend_error(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendError { key: key.into(), message: message.into() }
    }

    /// Create a config error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError { message: message.into() }
    }
}
