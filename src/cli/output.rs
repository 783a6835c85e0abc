//! Output formatting for CLI commands.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::provider::{CredentialRecord, Credentials, RecordState};

/// Output format for `show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

/// Print data as pretty JSON.
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

fn format_time(ts: &DateTime<Utc>) -> Option<String> {
    (*ts != DateTime::<Utc>::UNIX_EPOCH).then(|| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Non-secret view of a stored record.
#[derive(Debug, Serialize)]
pub struct RecordSummary {
    pub identity: String,
    pub name: Option<String>,
    pub access_key_id: String,
    pub has_session_token: bool,
    pub mfa_serial_number: Option<String>,
    pub has_mfa_secret: bool,
    pub expiration: Option<String>,
    pub ttl_seconds: i64,
    pub reload_after: Option<String>,
    pub expired: bool,
    pub state: RecordState,
}

impl RecordSummary {
    pub fn new(
        identity: &str,
        record: &CredentialRecord,
        expired: bool,
        state: RecordState,
    ) -> Self {
        Self {
            identity: identity.to_string(),
            name: record.name.clone(),
            access_key_id: record.access_key_id.clone(),
            has_session_token: !record.session_token.is_empty(),
            mfa_serial_number: Some(record.mfa_serial_number.clone()).filter(|s| !s.is_empty()),
            has_mfa_secret: !record.mfa_secret.is_empty(),
            expiration: format_time(&record.expiration),
            ttl_seconds: record.ttl_seconds,
            reload_after: format_time(&record.reload_after),
            expired,
            state,
        }
    }
}

/// Print a summary as an aligned two-column table.
pub fn print_summary_table(summary: &RecordSummary) {
    let dash = || "-".to_string();
    let rows = [
        ("Identity", summary.identity.clone()),
        ("Name", summary.name.clone().unwrap_or_else(dash)),
        ("Access key ID", summary.access_key_id.clone()),
        ("Session token", yes_no(summary.has_session_token)),
        ("MFA serial", summary.mfa_serial_number.clone().unwrap_or_else(dash)),
        ("MFA secret", yes_no(summary.has_mfa_secret)),
        ("Expiration", summary.expiration.clone().unwrap_or_else(dash)),
        ("TTL (seconds)", summary.ttl_seconds.to_string()),
        ("Reload after", summary.reload_after.clone().unwrap_or_else(dash)),
        ("Expired", yes_no(summary.expired)),
    ];

    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    for (label, value) in rows {
        println!("{:<width$}  {}", label, value, width = width);
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_string()
}

/// The JSON document read by an SDK `credential_process` hook.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessCredentials {
    pub version: u8,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

impl ProcessCredentials {
    pub fn new(credentials: &Credentials, expiration: &DateTime<Utc>) -> Self {
        let token = credentials.session_token.expose_secret();
        Self {
            version: 1,
            access_key_id: credentials.access_key_id.clone(),
            secret_access_key: credentials.secret_access_key.expose_secret().to_string(),
            session_token: Some(token.to_string()).filter(|t| !t.is_empty()),
            expiration: format_time(expiration),
        }
    }
}
