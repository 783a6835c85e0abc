//! Short-lived credential minting.
//!
//! A [`TokenMinter`] trades a long-lived access key, an MFA device serial and a
//! one-time code for a temporary credential set. [`StsTokenMinter`] does this with
//! the AWS STS `GetSessionToken` action.

pub mod client;

pub use client::{StsConfig, StsTokenMinter};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::secrets::SecretString;

/// The credential presented to the minter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongLivedCredential {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    /// Empty for permanent IAM user keys.
    pub session_token: SecretString,
}

/// A freshly minted temporary credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedCredential {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: SecretString,
    pub expiration: DateTime<Utc>,
}

/// Errors raised by a token minter.
#[derive(Error, Debug)]
pub enum MintError {
    /// The service answered and refused the exchange (bad code, unknown serial, denied).
    #[error("Token service rejected the request ({code}): {message}")]
    Rejected { code: String, message: String },

    /// The service could not be reached or the connection failed mid-request.
    #[error("Token service transport error: {message}")]
    Transport { message: String },

    /// The service answered with something that is not a credential.
    #[error("Invalid token service response: {message}")]
    InvalidResponse { message: String },

    /// The request could not be put together; nothing was sent.
    #[error("Invalid token service request: {message}")]
    InvalidRequest { message: String },
}

impl MintError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected { code: code.into(), message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse { message: message.into() }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into() }
    }
}

/// Exchanges a long-lived credential plus one-time code for a temporary credential.
#[async_trait]
pub trait TokenMinter: Send + Sync {
    async fn mint(
        &self,
        credential: &LongLivedCredential,
        mfa_serial: &str,
        code: &str,
        duration_secs: i64,
    ) -> Result<MintedCredential, MintError>;
}
