//! The secret store seam consumed by the credential engine.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use super::error::Result;

/// Field name to scalar mapping stored under one key.
pub type FieldMap = BTreeMap<String, StoredValue>;

/// A loosely typed scalar as it comes back from a secret store.
///
/// Stores hand back JSON, so a field written as a timestamp usually reads back as
/// text and an integer may read back as a float. Consumers parse each field with a
/// total function and degrade on a shape they do not expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    String(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

impl StoredValue {
    /// Convert a JSON value from a store response.
    ///
    /// `null` is treated as an absent field. Whole floats become integers. Any other
    /// shape (fractional number, bool, array, object) is kept as its JSON text so the
    /// field still counts as present and degrades downstream.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::String(s)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Integer(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                            Some(Self::Integer(f as i64))
                        }
                        _ => Some(Self::String(n.to_string())),
                    }
                }
            }
            other => Some(Self::String(other.to_string())),
        }
    }

    /// Convert into the JSON representation written to a store.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Timestamp(ts) => {
                serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }

    /// Short shape name used in degradation logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl Serialize for StoredValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Timestamp(ts) => {
                serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

impl From<&str> for StoredValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for StoredValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<DateTime<Utc>> for StoredValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

/// Build a [`FieldMap`] from a JSON object, dropping `null` fields.
///
/// Returns `None` when the value is not an object.
pub fn field_map_from_json(value: serde_json::Value) -> Option<FieldMap> {
    match value {
        serde_json::Value::Object(map) => Some(
            map.into_iter()
                .filter_map(|(k, v)| StoredValue::from_json(v).map(|v| (k, v)))
                .collect(),
        ),
        _ => None,
    }
}

/// Key-value secret storage addressed by an opaque key.
///
/// Implementations MUST NOT log field values. Each call performs at most one round
/// trip to the backend and never retries.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read the mapping stored at `key`.
    ///
    /// Returns `Ok(None)` when nothing is stored there.
    async fn read(&self, key: &str) -> Result<Option<FieldMap>>;

    /// Replace the mapping stored at `key`.
    async fn write(&self, key: &str, fields: &FieldMap) -> Result<()>;

    /// Remove whatever is stored at `key`.
    async fn delete(&self, key: &str) -> Result<()>;
}
