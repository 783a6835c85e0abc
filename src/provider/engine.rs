//! The credential lifecycle engine.

use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use super::builder::VaultCredsProviderBuilder;
use super::record::CredentialRecord;
use crate::clock::{system_clock, Clock};
use crate::errors::Result;
use crate::mfa::ChallengeGenerator;
use crate::secrets::{SecretStore, SecretString};
use crate::sts::TokenMinter;

/// Name reported alongside every credential set unless overridden.
pub const PROVIDER_NAME: &str = "VaultCredsProvider";

/// Credential set handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: SecretString,
    pub provider_name: String,
}

/// How far the in-memory record has come since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// Nothing has been read from the store yet.
    Empty,
    /// The stored mapping has been applied.
    Loaded,
    /// A short-lived credential was minted with MFA after the last load.
    Refreshed,
}

/// Loads, refreshes and persists the credential record stored under one identity.
///
/// Operations take `&mut self`; wrap the engine in a
/// [`SharedProvider`](super::SharedProvider) to use one identity from several tasks.
pub struct VaultCredsProvider {
    identity: String,
    provider_name: String,
    pub(super) record: CredentialRecord,
    state: RecordState,
    store: Arc<dyn SecretStore>,
    challenge: Arc<dyn ChallengeGenerator>,
    minter: Arc<dyn TokenMinter>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for VaultCredsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultCredsProvider")
            .field("identity", &self.identity)
            .field("provider_name", &self.provider_name)
            .field("state", &self.state)
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

impl VaultCredsProvider {
    /// Engine with an empty record and the system clock.
    pub fn new(
        identity: impl Into<String>,
        store: Arc<dyn SecretStore>,
        challenge: Arc<dyn ChallengeGenerator>,
        minter: Arc<dyn TokenMinter>,
    ) -> Self {
        Self::from_parts(
            identity.into(),
            PROVIDER_NAME.to_string(),
            CredentialRecord::default(),
            store,
            challenge,
            minter,
            system_clock(),
        )
    }

    pub fn builder(identity: impl Into<String>) -> VaultCredsProviderBuilder {
        VaultCredsProviderBuilder::new(identity)
    }

    pub(super) fn from_parts(
        identity: String,
        provider_name: String,
        record: CredentialRecord,
        store: Arc<dyn SecretStore>,
        challenge: Arc<dyn ChallengeGenerator>,
        minter: Arc<dyn TokenMinter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity,
            provider_name,
            record,
            state: RecordState::Empty,
            store,
            challenge,
            minter,
            clock,
        }
    }

    /// Store key this engine reads and writes.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn record(&self) -> &CredentialRecord {
        &self.record
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Overlay the stored mapping onto the in-memory record.
    ///
    /// Nothing stored is a legal empty mapping. Fields with an unusable shape fall back
    /// to a safe default and are logged, never returned as errors.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn load(&mut self) -> Result<()> {
        let fields = self.store.read(&self.identity).await?;
        let now = self.clock.now();

        let fields = match fields {
            Some(fields) => fields,
            None => {
                tracing::debug!("No stored record, keeping in-memory values");
                Default::default()
            }
        };

        let outcome = self.record.apply_fields(&fields, now);
        for degraded in &outcome.degraded {
            tracing::warn!(
                field = degraded.field,
                found = degraded.found,
                "Stored field has an unusable value, using fallback"
            );
        }

        self.state = RecordState::Loaded;
        tracing::debug!(
            applied = outcome.applied.len(),
            ttl_seconds = self.record.ttl_seconds,
            reload_after = %self.record.reload_after,
            "Loaded credential record"
        );
        Ok(())
    }

    /// Whether the caller should call [`retrieve`](Self::retrieve) again. No I/O.
    pub fn is_expired(&self) -> bool {
        self.record.is_expired_at(self.clock.now())
    }

    /// Load the record, step up with MFA when configured, and hand out the credentials.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn retrieve(&mut self) -> Result<Credentials> {
        self.load().await?;

        if self.record.has_mfa() {
            self.refresh_with_mfa().await?;
        }

        Ok(Credentials {
            access_key_id: self.record.access_key_id.clone(),
            secret_access_key: self.record.secret_access_key.clone(),
            session_token: self.record.session_token.clone(),
            provider_name: self.provider_name.clone(),
        })
    }

    /// Mint a short-lived credential. The record is untouched unless every step succeeds.
    async fn refresh_with_mfa(&mut self) -> Result<()> {
        let challenge = self.challenge.current_code(&self.record.mfa_secret)?;
        let duration_secs = self.record.requested_duration();

        tracing::debug!(
            mfa_serial = %self.record.mfa_serial_number,
            duration_secs,
            code_valid_for_secs = challenge.remaining.as_secs(),
            "Refreshing credential with MFA"
        );

        let minted = self
            .minter
            .mint(
                &self.record.long_lived(),
                &self.record.mfa_serial_number,
                &challenge.code,
                duration_secs,
            )
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "MFA refresh failed"))?;

        self.record.apply_minted(minted, self.clock.now());
        self.state = RecordState::Refreshed;

        tracing::info!(
            access_key_id = %self.record.access_key_id,
            expiration = %self.record.expiration,
            reload_after = %self.record.reload_after,
            "Refreshed credential with MFA"
        );
        Ok(())
    }

    /// Write the full record under the identity key.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn save(&self) -> Result<()> {
        self.store.write(&self.identity, &self.record.to_fields()).await?;
        tracing::info!("Saved credential record");
        Ok(())
    }

    /// Remove the stored record. The in-memory record is kept.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn delete(&self) -> Result<()> {
        self.store.delete(&self.identity).await?;
        tracing::info!("Deleted credential record");
        Ok(())
    }
}
