//! # vaultcreds
//!
//! Cloud access credentials kept in HashiCorp Vault, with TOTP MFA step-up.
//!
//! A [`VaultCredsProvider`] owns one credential record stored under an identity key.
//! Each `retrieve` reloads the record; when an MFA device serial and seed are stored
//! with it, the long-lived key and a fresh one-time code are exchanged with AWS STS for
//! a short-lived session credential. `is_expired` tells an outer cache when to ask
//! again.
//!
//! ```text
//! retrieve() → SecretStore::read → ChallengeGenerator (TOTP) → TokenMinter (STS)
//!                   ↓                                                ↓
//!             VaultSecretStore                               Credentials
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vaultcreds::{Config, Result, VaultCredsProvider};
//! use vaultcreds::mfa::TotpGenerator;
//! use vaultcreds::secrets::VaultSecretStore;
//! use vaultcreds::sts::StsTokenMinter;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(VaultSecretStore::new(config.vault).await?);
//!     let minter = Arc::new(StsTokenMinter::new(config.sts)?);
//!
//!     let mut provider = VaultCredsProvider::new(
//!         "arn:aws:iam::123456789012:user/ci",
//!         store,
//!         Arc::new(TotpGenerator::default()),
//!         minter,
//!     );
//!     let credentials = provider.retrieve().await?;
//!     println!("{}", credentials.access_key_id);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod clock;
pub mod config;
pub mod errors;
pub mod mfa;
pub mod observability;
pub mod provider;
pub mod secrets;
pub mod sts;

// Re-export commonly used types and traits
pub use config::Config;
pub use errors::{Error, Result};
pub use observability::init_logging;
pub use provider::{Credentials, SharedProvider, VaultCredsProvider, PROVIDER_NAME};
