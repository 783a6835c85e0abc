//! One-time code generation for MFA step-up.
//!
//! The engine asks a [`ChallengeGenerator`] for the code that is current right now and
//! hands it to the token minter. [`TotpGenerator`] is the RFC 6238 implementation
//! used by virtual MFA devices: HMAC-SHA1, 30 second step, 6 digits, base32 seed.

pub mod totp;

pub use totp::TotpGenerator;

use std::time::Duration;
use thiserror::Error;

use crate::secrets::SecretString;

/// A generated one-time code and how long it stays valid.
#[derive(Clone, PartialEq, Eq)]
pub struct ChallengeCode {
    pub code: String,
    pub remaining: Duration,
}

impl std::fmt::Debug for ChallengeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeCode")
            .field("code", &"[REDACTED]")
            .field("remaining", &self.remaining)
            .finish()
    }
}

/// Errors raised while producing a one-time code.
#[derive(Error, Debug)]
pub enum ChallengeError {
    /// The shared secret is not usable as a TOTP seed.
    #[error("Invalid MFA secret: {reason}")]
    InvalidSecret { reason: String },

    /// The clock reads a time before the Unix epoch.
    #[error("Clock error: {message}")]
    Clock { message: String },
}

impl ChallengeError {
    pub fn invalid_secret(reason: impl Into<String>) -> Self {
        Self::InvalidSecret { reason: reason.into() }
    }
}

/// Produces the current time-based one-time code for a shared secret.
pub trait ChallengeGenerator: Send + Sync {
    fn current_code(&self, secret: &SecretString) -> Result<ChallengeCode, ChallengeError>;
}
