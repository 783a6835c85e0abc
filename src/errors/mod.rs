//! # Error Handling
//!
//! Error types for the credential provider. Each variant corresponds to the sub-step
//! that failed, so a caller can tell "the secret store is unreachable" (retry later)
//! apart from "the MFA exchange was refused" (re-provision the device secret).

use crate::mfa::ChallengeError;
use crate::secrets::SecretsError;
use crate::sts::MintError;

/// Custom result type for provider operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the credential provider
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Secret store read/write/delete failed
    #[error("Secret store unavailable: {0}")]
    Store(#[from] SecretsError),

    /// One-time code could not be generated; the record was not touched
    #[error("MFA challenge failed: {0}")]
    Challenge(#[from] ChallengeError),

    /// Token service refused or failed the exchange; the record was not touched
    #[error("Session token mint failed: {0}")]
    Mint(#[from] MintError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Name of the step that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Store(_) => "store",
            Self::Challenge(_) => "challenge",
            Self::Mint(_) => "mint",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }

    /// Whether trying the same call again later can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(
                SecretsError::ConnectionFailed { .. } | SecretsError::BackendError { .. },
            ) => true,
            Self::Mint(MintError::Transport { .. }) => true,
            _ => false,
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Config(format!("Validation failed: {}", flatten(&errors, "")))
    }
}

/// `field: message` pairs, nested fields as `parent.child`.
fn flatten(errors: &validator::ValidationErrors, prefix: &str) -> String {
    use validator::ValidationErrorsKind;

    errors
        .errors()
        .iter()
        .map(|(field, kind)| {
            let path = format!("{}{}", prefix, field);
            match kind {
                ValidationErrorsKind::Field(field_errors) => {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map_or("Invalid value".to_string(), |m| m.to_string())
                        })
                        .collect();
                    format!("{}: {}", path, messages.join(", "))
                }
                ValidationErrorsKind::Struct(nested) => flatten(nested, &format!("{}.", path)),
                ValidationErrorsKind::List(items) => items
                    .iter()
                    .map(|(index, nested)| flatten(nested, &format!("{}[{}].", path, index)))
                    .collect::<Vec<_>>()
                    .join("; "),
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names_failed_step() {
        let err: Error = SecretsError::connection_failed("refused").into();
        assert_eq!(err.stage(), "store");
        assert!(err.to_string().starts_with("Secret store unavailable"));

        let err: Error = ChallengeError::invalid_secret("not base32").into();
        assert_eq!(err.stage(), "challenge");

        let err: Error = MintError::rejected("AccessDenied", "bad code").into();
        assert_eq!(err.stage(), "mint");
        assert!(err.to_string().contains("AccessDenied"));

        assert_eq!(Error::config("missing arn").stage(), "config");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::from(SecretsError::connection_failed("timeout")).is_retryable());
        assert!(Error::from(MintError::transport("reset")).is_retryable());
        assert!(!Error::from(MintError::rejected("AccessDenied", "bad code")).is_retryable());
        assert!(!Error::from(MintError::invalid_request("duration out of range")).is_retryable());
        assert!(!Error::config("STS endpoint 'x' has no host").is_retryable());
        assert!(!Error::from(SecretsError::authentication_failed("denied")).is_retryable());
        assert!(!Error::from(ChallengeError::invalid_secret("bad")).is_retryable());
    }
}
