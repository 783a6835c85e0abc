//! # Credential Provider
//!
//! [`VaultCredsProvider`] keeps one cloud credential record in a [`SecretStore`]
//! under an identity key (usually an IAM ARN). `retrieve` reloads the record and, when
//! an MFA device serial and seed are stored with it, exchanges the long-lived key plus
//! a fresh one-time code for a short-lived session credential. `is_expired` tells an
//! outer cache when to call `retrieve` again.
//!
//! [`SecretStore`]: crate::secrets::SecretStore

pub mod builder;
pub mod engine;
pub mod record;
pub mod shared;

pub use builder::VaultCredsProviderBuilder;
pub use engine::{Credentials, RecordState, VaultCredsProvider, PROVIDER_NAME};
pub use record::{
    reload_boundary, CredentialRecord, DEFAULT_DURATION_SECS, MIN_TTL_AFTER_MFA_SECS,
};
pub use shared::SharedProvider;
