//! The cached credential record and its stored representation.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::secrets::{FieldMap, SecretString, StoredValue};
use crate::sts::{LongLivedCredential, MintedCredential};

/// Floor for the duration requested from the token service, in seconds.
pub const DEFAULT_DURATION_SECS: i64 = 900;

/// A one-time code cannot be replayed inside its window, so a freshly minted
/// credential is trusted for at least this long.
pub const MIN_TTL_AFTER_MFA_SECS: i64 = 30;

/// Field names of the stored mapping. Changing any of these orphans existing records.
pub mod field {
    pub const NAME: &str = "Name";
    pub const ACCESS_KEY_ID: &str = "AccessKeyID";
    pub const SECRET_ACCESS_KEY: &str = "SecretAccessKey";
    pub const SESSION_TOKEN: &str = "SessionToken";
    pub const MFA_SERIAL_NUMBER: &str = "MFASerialNumber";
    pub const MFA_SECRET: &str = "MFASecret";
    pub const EXPIRATION: &str = "Expiration";
    pub const TTL: &str = "TTL";
}

/// A field that was present but unusable and got replaced by its safe default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degraded {
    pub field: &'static str,
    pub found: &'static str,
}

/// What [`CredentialRecord::apply_fields`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedFields {
    pub applied: Vec<&'static str>,
    pub degraded: Vec<Degraded>,
}

/// One cached cloud credential.
///
/// `Debug` and `Serialize` never reveal the secret key, session token or MFA seed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CredentialRecord {
    pub name: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: SecretString,
    /// When the credential stops working. The Unix epoch means "unknown".
    pub expiration: DateTime<Utc>,
    /// Negative disables caching altogether.
    pub ttl_seconds: i64,
    /// Freshness boundary checked by `is_expired`; never later than `expiration`.
    pub reload_after: DateTime<Utc>,
    pub mfa_serial_number: String,
    pub mfa_secret: SecretString,
}

fn is_unset(ts: &DateTime<Utc>) -> bool {
    *ts == DateTime::<Utc>::UNIX_EPOCH
}

fn add_seconds(now: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    let saturated = if seconds < 0 { DateTime::<Utc>::MIN_UTC } else { DateTime::<Utc>::MAX_UTC };
    TimeDelta::try_seconds(seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(saturated)
}

/// `min(expiration, now + ttl)`, or just `now + ttl` when the expiration is unknown.
pub fn reload_boundary(
    expiration: DateTime<Utc>,
    ttl_seconds: i64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let candidate = add_seconds(now, ttl_seconds);
    if is_unset(&expiration) {
        candidate
    } else {
        expiration.min(candidate)
    }
}

/// Text fields accept any scalar; non-text shapes are rendered rather than rejected.
fn parse_text(value: &StoredValue) -> String {
    match value {
        StoredValue::String(s) => s.clone(),
        StoredValue::Integer(i) => i.to_string(),
        StoredValue::Timestamp(ts) => ts.to_rfc3339(),
    }
}

/// RFC 3339 text or a native timestamp; anything else is unusable.
pub fn parse_expiration(value: &StoredValue) -> Option<DateTime<Utc>> {
    match value {
        StoredValue::Timestamp(ts) => Some(*ts),
        StoredValue::String(s) => {
            DateTime::parse_from_rfc3339(s.trim()).ok().map(|ts| ts.with_timezone(&Utc))
        }
        StoredValue::Integer(_) => None,
    }
}

/// An integer, or text holding a base-10 integer; anything else is unusable.
pub fn parse_ttl(value: &StoredValue) -> Option<i64> {
    match value {
        StoredValue::Integer(i) => Some(*i),
        StoredValue::String(s) => s.trim().parse().ok(),
        StoredValue::Timestamp(_) => None,
    }
}

impl CredentialRecord {
    /// Both the serial and the seed are needed to mint with MFA.
    pub fn has_mfa(&self) -> bool {
        !self.mfa_serial_number.is_empty() && !self.mfa_secret.is_empty()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.ttl_seconds < 0 || now > self.reload_after
    }

    /// The credential presented to the token service.
    pub fn long_lived(&self) -> LongLivedCredential {
        LongLivedCredential {
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            session_token: self.session_token.clone(),
        }
    }

    /// Overlay a stored mapping onto this record.
    ///
    /// Absent fields keep their current value. Unusable `Expiration` becomes `now`,
    /// unusable `TTL` becomes `-1`. `reload_after` is recomputed from the TTL when one
    /// was stored, or follows the expiration when only that was stored.
    pub fn apply_fields(&mut self, fields: &FieldMap, now: DateTime<Utc>) -> AppliedFields {
        let mut outcome = AppliedFields::default();

        let mut text = |name: &'static str, target: &mut String| {
            if let Some(value) = fields.get(name) {
                *target = parse_text(value);
                outcome.applied.push(name);
            }
        };

        let mut name = self.name.clone().unwrap_or_default();
        let had_name = fields.contains_key(field::NAME);
        text(field::NAME, &mut name);
        if had_name {
            self.name = Some(name).filter(|n| !n.is_empty());
        }

        text(field::ACCESS_KEY_ID, &mut self.access_key_id);
        text(field::MFA_SERIAL_NUMBER, &mut self.mfa_serial_number);

        for (key, target) in [
            (field::SECRET_ACCESS_KEY, &mut self.secret_access_key),
            (field::SESSION_TOKEN, &mut self.session_token),
            (field::MFA_SECRET, &mut self.mfa_secret),
        ] {
            if let Some(value) = fields.get(key) {
                *target = SecretString::new(parse_text(value));
                outcome.applied.push(key);
            }
        }

        let expiration_present = match fields.get(field::EXPIRATION) {
            Some(value) => {
                self.expiration = parse_expiration(value).unwrap_or_else(|| {
                    outcome
                        .degraded
                        .push(Degraded { field: field::EXPIRATION, found: value.kind() });
                    now
                });
                outcome.applied.push(field::EXPIRATION);
                true
            }
            None => false,
        };

        match fields.get(field::TTL) {
            Some(value) => {
                self.ttl_seconds = parse_ttl(value).unwrap_or_else(|| {
                    outcome.degraded.push(Degraded { field: field::TTL, found: value.kind() });
                    -1
                });
                outcome.applied.push(field::TTL);
                self.reload_after = reload_boundary(self.expiration, self.ttl_seconds, now);
            }
            None if expiration_present => self.reload_after = self.expiration,
            None => {}
        }

        outcome
    }

    /// The full stored mapping for this record.
    pub fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        if let Some(ref name) = self.name {
            fields.insert(field::NAME.to_string(), name.as_str().into());
        }
        fields.insert(field::ACCESS_KEY_ID.to_string(), self.access_key_id.as_str().into());
        fields.insert(
            field::SECRET_ACCESS_KEY.to_string(),
            self.secret_access_key.expose_secret().into(),
        );
        fields.insert(field::SESSION_TOKEN.to_string(), self.session_token.expose_secret().into());
        fields.insert(
            field::MFA_SERIAL_NUMBER.to_string(),
            self.mfa_serial_number.as_str().into(),
        );
        fields.insert(field::MFA_SECRET.to_string(), self.mfa_secret.expose_secret().into());
        fields.insert(field::EXPIRATION.to_string(), StoredValue::Timestamp(self.expiration));
        fields.insert(field::TTL.to_string(), StoredValue::Integer(self.ttl_seconds));
        fields
    }

    /// Replace the credential triple with a minted one.
    ///
    /// Raises the TTL to [`MIN_TTL_AFTER_MFA_SECS`] and moves the reload boundary so the
    /// code just spent is not needed again inside its window.
    pub fn apply_minted(&mut self, minted: MintedCredential, now: DateTime<Utc>) {
        self.access_key_id = minted.access_key_id;
        self.secret_access_key = minted.secret_access_key;
        self.session_token = minted.session_token;
        self.expiration = minted.expiration;
        if self.ttl_seconds < MIN_TTL_AFTER_MFA_SECS {
            self.ttl_seconds = MIN_TTL_AFTER_MFA_SECS;
        }
        self.reload_after = reload_boundary(self.expiration, self.ttl_seconds, now);
    }

    /// Duration to ask the token service for.
    pub fn requested_duration(&self) -> i64 {
        self.ttl_seconds.max(DEFAULT_DURATION_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 3, 14, h, m, s).unwrap()
    }

    fn fields(pairs: &[(&str, StoredValue)]) -> FieldMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_negative_ttl_is_always_expired() {
        let record = CredentialRecord {
            ttl_seconds: -1,
            reload_after: DateTime::<Utc>::MAX_UTC,
            ..Default::default()
        };
        assert!(record.is_expired_at(at(0, 0, 0)));
    }

    #[test]
    fn test_expiry_is_strictly_after_boundary() {
        let record = CredentialRecord { reload_after: at(12, 0, 0), ..Default::default() };
        assert!(!record.is_expired_at(at(11, 59, 59)));
        assert!(!record.is_expired_at(at(12, 0, 0)));
        assert!(record.is_expired_at(at(12, 0, 1)));
    }

    #[test]
    fn test_reload_boundary_takes_earlier_time() {
        let expiration = Utc.with_ymd_and_hms(2016, 3, 15, 0, 5, 7).unwrap();
        assert_eq!(reload_boundary(expiration, 900, at(23, 0, 0)), at(23, 15, 0));
        assert_eq!(reload_boundary(expiration, 7200, at(23, 0, 0)), expiration);
        assert_eq!(
            reload_boundary(DateTime::<Utc>::UNIX_EPOCH, 900, at(23, 0, 0)),
            at(23, 15, 0)
        );
    }

    #[test]
    fn test_reload_boundary_saturates() {
        assert_eq!(
            reload_boundary(DateTime::<Utc>::UNIX_EPOCH, i64::MAX, at(0, 0, 0)),
            DateTime::<Utc>::MAX_UTC
        );
    }

    #[test]
    fn test_parse_ttl_shapes() {
        assert_eq!(parse_ttl(&StoredValue::Integer(900)), Some(900));
        assert_eq!(parse_ttl(&StoredValue::from(" 60 ")), Some(60));
        assert_eq!(parse_ttl(&StoredValue::from("soon")), None);
        assert_eq!(parse_ttl(&StoredValue::Timestamp(at(0, 0, 0))), None);
    }

    #[test]
    fn test_parse_expiration_shapes() {
        let expected = Utc.with_ymd_and_hms(2016, 3, 15, 0, 5, 7).unwrap();
        assert_eq!(parse_expiration(&StoredValue::from("2016-03-15T00:05:07Z")), Some(expected));
        assert_eq!(
            parse_expiration(&StoredValue::from("2016-03-15T01:05:07+01:00")),
            Some(expected)
        );
        assert_eq!(parse_expiration(&StoredValue::Timestamp(expected)), Some(expected));
        assert_eq!(parse_expiration(&StoredValue::from("15/03/2016")), None);
        assert_eq!(parse_expiration(&StoredValue::Integer(1458000307)), None);
    }

    #[test]
    fn test_apply_partial_mapping_keeps_other_fields() {
        let mut record = CredentialRecord {
            access_key_id: "AKIAOLD".to_string(),
            mfa_serial_number: "arn:aws:iam::123456789012:mfa/test".to_string(),
            ..Default::default()
        };
        let outcome = record.apply_fields(
            &fields(&[(field::SECRET_ACCESS_KEY, StoredValue::from("new-secret"))]),
            at(0, 0, 0),
        );

        assert_eq!(outcome.applied, vec![field::SECRET_ACCESS_KEY]);
        assert_eq!(record.access_key_id, "AKIAOLD");
        assert_eq!(record.secret_access_key.expose_secret(), "new-secret");
        assert_eq!(record.mfa_serial_number, "arn:aws:iam::123456789012:mfa/test");
    }

    #[test]
    fn test_apply_degrades_malformed_fields() {
        let mut record = CredentialRecord::default();
        let now = at(10, 0, 0);
        let outcome = record.apply_fields(
            &fields(&[
                (field::EXPIRATION, StoredValue::from("yesterday")),
                (field::TTL, StoredValue::Timestamp(now)),
            ]),
            now,
        );

        assert_eq!(record.expiration, now);
        assert_eq!(record.ttl_seconds, -1);
        assert_eq!(outcome.degraded.len(), 2);
        assert_eq!(outcome.degraded[1], Degraded { field: field::TTL, found: "timestamp" });
        assert!(record.is_expired_at(now));
    }

    #[test]
    fn test_apply_expiration_without_ttl_follows_expiration() {
        let mut record = CredentialRecord::default();
        record.apply_fields(
            &fields(&[(field::EXPIRATION, StoredValue::from("2016-03-14T12:00:00Z"))]),
            at(10, 0, 0),
        );
        assert_eq!(record.reload_after, at(12, 0, 0));
        assert!(!record.is_expired_at(at(11, 0, 0)));
    }

    #[test]
    fn test_apply_name_and_empty_name() {
        let mut record = CredentialRecord::default();
        record
            .apply_fields(&fields(&[(field::NAME, StoredValue::from("ci-deployer"))]), at(0, 0, 0));
        assert_eq!(record.name.as_deref(), Some("ci-deployer"));

        record.apply_fields(&fields(&[(field::NAME, StoredValue::from(""))]), at(0, 0, 0));
        assert_eq!(record.name, None);
    }

    #[test]
    fn test_to_fields_writes_every_field() {
        let record = CredentialRecord {
            name: Some("ci".to_string()),
            access_key_id: "ASIAJEXAMPLEXEG2JICEA".to_string(),
            secret_access_key: SecretString::new("secret"),
            session_token: SecretString::new("token"),
            expiration: Utc.with_ymd_and_hms(2016, 3, 15, 0, 5, 7).unwrap(),
            ttl_seconds: 900,
            mfa_serial_number: "serial".to_string(),
            mfa_secret: SecretString::new("JBSWY3DPEHPK3PXP"),
            ..Default::default()
        };

        let stored = serde_json::to_value(record.to_fields()).unwrap();
        assert_eq!(stored["Name"], "ci");
        assert_eq!(stored["SecretAccessKey"], "secret");
        assert_eq!(stored["MFASecret"], "JBSWY3DPEHPK3PXP");
        assert_eq!(stored["Expiration"], "2016-03-15T00:05:07Z");
        assert_eq!(stored["TTL"], 900);
    }

    #[test]
    fn test_to_fields_omits_missing_name() {
        assert!(!CredentialRecord::default().to_fields().contains_key(field::NAME));
    }

    #[test]
    fn test_apply_minted_raises_ttl_and_moves_boundary() {
        let now = at(10, 0, 0);
        let mut record = CredentialRecord { ttl_seconds: 10, ..Default::default() };
        record.apply_minted(
            MintedCredential {
                access_key_id: "ASIANEW".to_string(),
                secret_access_key: SecretString::new("s"),
                session_token: SecretString::new("t"),
                expiration: at(10, 15, 0),
            },
            now,
        );

        assert_eq!(record.ttl_seconds, MIN_TTL_AFTER_MFA_SECS);
        assert_eq!(record.reload_after, at(10, 0, 30));
        assert!(record.reload_after <= record.expiration);
        assert!(!record.is_expired_at(at(10, 0, 29)));
    }

    #[test]
    fn test_requested_duration_floor() {
        let mut record = CredentialRecord { ttl_seconds: 10, ..Default::default() };
        assert_eq!(record.requested_duration(), DEFAULT_DURATION_SECS);
        record.ttl_seconds = 3600;
        assert_eq!(record.requested_duration(), 3600);
    }

    #[test]
    fn test_debug_and_serialize_redact_secrets() {
        let record = CredentialRecord {
            secret_access_key: SecretString::new("super-secret-key"),
            session_token: SecretString::new("super-session-token"),
            mfa_secret: SecretString::new("JBSWY3DPEHPK3PXP"),
            ..Default::default()
        };
        let debug = format!("{:?}", record);
        let json = serde_json::to_string(&record).unwrap();
        for leaked in ["super-secret-key", "super-session-token", "JBSWY3DPEHPK3PXP"] {
            assert!(!debug.contains(leaked));
            assert!(!json.contains(leaked));
        }
    }

    #[test]
    fn test_has_mfa_needs_both_parts() {
        let mut record = CredentialRecord {
            mfa_serial_number: "serial".to_string(),
            ..Default::default()
        };
        assert!(!record.has_mfa());
        record.mfa_secret = SecretString::new("JBSWY3DPEHPK3PXP");
        assert!(record.has_mfa());
    }
}
