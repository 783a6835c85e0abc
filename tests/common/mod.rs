//! Common test utilities for all integration tests.
//!
//! Test doubles for the challenge and minting seams plus small fixture helpers.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vaultcreds::clock::ManualClock;
use vaultcreds::mfa::{ChallengeCode, ChallengeError, ChallengeGenerator};
use vaultcreds::secrets::{FieldMap, MemorySecretStore, SecretString, StoredValue};
use vaultcreds::sts::{LongLivedCredential, MintError, MintedCredential, TokenMinter};
use vaultcreds::VaultCredsProvider;

pub const IDENTITY: &str = "arn:aws:iam::123456789012:user/ci-deployer";
pub const MFA_SERIAL: &str = "arn:aws:iam::123456789012:mfa/ci-deployer";
pub const MFA_SEED: &str = "JBSWY3DPEHPK3PXP";

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

pub fn fields(pairs: &[(&str, StoredValue)]) -> FieldMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Always answers with the same code.
pub struct FixedChallenge(pub &'static str);

impl ChallengeGenerator for FixedChallenge {
    fn current_code(&self, _secret: &SecretString) -> Result<ChallengeCode, ChallengeError> {
        Ok(ChallengeCode { code: self.0.to_string(), remaining: Duration::from_secs(15) })
    }
}

/// One recorded `mint` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintCall {
    pub access_key_id: String,
    pub mfa_serial: String,
    pub code: String,
    pub duration_secs: i64,
}

/// Records every call and answers with a fixed credential or a fixed rejection.
pub struct ScriptedMinter {
    pub calls: Mutex<Vec<MintCall>>,
    response: Result<MintedCredential, (String, String)>,
    /// Calls after this many are rejected.
    successes: Option<usize>,
}

fn access_denied() -> (String, String) {
    (
        "AccessDenied".to_string(),
        "MultiFactorAuthentication failed with invalid MFA one time pass code.".to_string(),
    )
}

impl ScriptedMinter {
    pub fn succeeding(expiration: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            response: Ok(MintedCredential {
                access_key_id: "ASIAMINTEDEXAMPLE".to_string(),
                secret_access_key: SecretString::new("minted-secret-access-key"),
                session_token: SecretString::new("minted-session-token"),
                expiration,
            }),
            successes: None,
        })
    }

    /// Succeeds on the first call, rejects every later one.
    pub fn succeeding_once(expiration: DateTime<Utc>) -> Arc<Self> {
        let mut minter = Self::succeeding(expiration);
        if let Some(minter) = Arc::get_mut(&mut minter) {
            minter.successes = Some(1);
        }
        minter
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            response: Err(access_denied()),
            successes: None,
        })
    }

    pub fn calls(&self) -> Vec<MintCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenMinter for ScriptedMinter {
    async fn mint(
        &self,
        credential: &LongLivedCredential,
        mfa_serial: &str,
        code: &str,
        duration_secs: i64,
    ) -> Result<MintedCredential, MintError> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(MintCall {
                access_key_id: credential.access_key_id.clone(),
                mfa_serial: mfa_serial.to_string(),
                code: code.to_string(),
                duration_secs,
            });
            calls.len()
        };
        if self.successes.is_some_and(|successes| attempt > successes) {
            let (code, message) = access_denied();
            return Err(MintError::rejected(code, message));
        }
        match self.response {
            Ok(ref minted) => Ok(minted.clone()),
            Err((ref code, ref message)) => Err(MintError::rejected(code.clone(), message.clone())),
        }
    }
}

/// Engine over a memory store with a manual clock set to `now`.
pub fn provider_at(
    store: &MemorySecretStore,
    minter: Arc<ScriptedMinter>,
    now: DateTime<Utc>,
) -> (VaultCredsProvider, ManualClock) {
    let clock = ManualClock::new(now);
    let provider = VaultCredsProvider::builder(IDENTITY)
        .clock(Arc::new(clock.clone()))
        .build(Arc::new(store.clone()), Arc::new(FixedChallenge("123456")), minter);
    (provider, clock)
}
