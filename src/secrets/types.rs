//! Redacting wrapper for credential material.
//!
//! Secret access keys, session tokens and MFA seeds travel through the engine as
//! [`SecretString`], so a stray `{:?}`, `tracing` field or `serde_json::to_string`
//! can never print them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

const REDACTED: &str = "[REDACTED]";

/// A string whose contents are hidden from Debug, Display and serde output.
///
/// The buffer is zeroed when the value is dropped. Use [`SecretString::expose_secret`]
/// at the exact point where the raw value has to leave the process (a store write,
/// a signed request).
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Borrow the raw value. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "SecretString(<empty>)")
        } else {
            write!(f, "SecretString({})", REDACTED)
        }
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_KEY: &str = "9drTJvcXLB89EXAMPLELB8923FB892xMFI";

    #[test]
    fn test_debug_and_display_hide_secret_key() {
        let secret = SecretString::new(SECRET_KEY);
        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn test_debug_marks_empty_session_token() {
        // Permanent credentials carry no session token; say so without leaking anything.
        assert_eq!(format!("{:?}", SecretString::default()), "SecretString(<empty>)");
    }

    #[test]
    fn test_expose_returns_raw_value() {
        let secret = SecretString::from(SECRET_KEY);
        assert_eq!(secret.expose_secret(), SECRET_KEY);
        assert_eq!(secret.len(), SECRET_KEY.len());
        assert!(!secret.is_empty());
    }

    #[test]
    fn test_serialization_redacts_inside_struct() {
        #[derive(Serialize)]
        struct Creds {
            access_key_id: String,
            secret_access_key: SecretString,
        }

        let json = serde_json::to_string(&Creds {
            access_key_id: "ASIAJEXAMPLEXEG2JICEA".to_string(),
            secret_access_key: SecretString::new(SECRET_KEY),
        })
        .unwrap();

        assert!(json.contains("ASIAJEXAMPLEXEG2JICEA"));
        assert!(json.contains(REDACTED));
        assert!(!json.contains(SECRET_KEY));
    }

    #[test]
    fn test_deserialization_keeps_value() {
        let secret: SecretString = serde_json::from_str("\"JBSWY3DPEHPK3PXP\"").unwrap();
        assert_eq!(secret.expose_secret(), "JBSWY3DPEHPK3PXP");
    }
}
