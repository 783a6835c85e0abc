//! RFC 6238 time-based one-time passwords.

use base32::Alphabet;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::sync::Arc;
use std::time::Duration;

use super::{ChallengeCode, ChallengeError, ChallengeGenerator};
use crate::clock::{system_clock, Clock};
use crate::secrets::SecretString;

type HmacSha1 = Hmac<Sha1>;

/// Step length used by virtual MFA devices.
pub const DEFAULT_STEP_SECS: u64 = 30;

/// Code length accepted by STS.
pub const DEFAULT_DIGITS: u32 = 6;

/// TOTP generator over a base32 shared secret.
#[derive(Debug, Clone)]
pub struct TotpGenerator {
    clock: Arc<dyn Clock>,
    step_secs: u64,
    digits: u32,
}

impl Default for TotpGenerator {
    fn default() -> Self {
        Self::new(system_clock())
    }
}

impl TotpGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, step_secs: DEFAULT_STEP_SECS, digits: DEFAULT_DIGITS }
    }

    /// Decode a base32 seed as printed by MFA enrolment screens.
    ///
    /// Case, spaces and `=` padding are ignored.
    pub fn decode_secret(secret: &SecretString) -> Result<Vec<u8>, ChallengeError> {
        let normalized: String = secret
            .expose_secret()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '=')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.is_empty() {
            return Err(ChallengeError::invalid_secret("secret is empty"));
        }

        base32::decode(Alphabet::Rfc4648 { padding: false }, &normalized)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ChallengeError::invalid_secret("secret is not valid base32"))
    }

    /// Code for an explicit Unix time; `current_code` calls this with the clock's time.
    pub fn code_at(&self, key: &[u8], unix_secs: u64) -> Result<ChallengeCode, ChallengeError> {
        let counter = unix_secs / self.step_secs;

        let mut mac = HmacSha1::new_from_slice(key)
            .map_err(|e| ChallengeError::invalid_secret(e.to_string()))?;
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        // Dynamic truncation, RFC 4226 section 5.3.
        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = u32::from_be_bytes([
            digest[offset] & 0x7f,
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ]);
        let value = binary % 10u32.pow(self.digits);

        Ok(ChallengeCode {
            code: format!("{:0width$}", value, width = self.digits as usize),
            remaining: Duration::from_secs(self.step_secs - unix_secs % self.step_secs),
        })
    }
}

impl ChallengeGenerator for TotpGenerator {
    fn current_code(&self, secret: &SecretString) -> Result<ChallengeCode, ChallengeError> {
        let key = Self::decode_secret(secret)?;
        let now = self.clock.now().timestamp();
        let unix_secs = u64::try_from(now).map_err(|_| ChallengeError::Clock {
            message: format!("time {} is before the Unix epoch", now),
        })?;
        self.code_at(&key, unix_secs)
    }
}
