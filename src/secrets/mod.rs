//! Secret store layer.
//!
//! The credential engine persists its records through the [`SecretStore`] trait. Two
//! implementations ship with the crate:
//!
//! - [`VaultSecretStore`]: HashiCorp Vault KV v2 via `vaultrs`, token or AppRole auth
//! - [`MemorySecretStore`]: process-local map for tests and dry runs
//!
//! Values come back loosely typed ([`StoredValue`]); the engine decides how to parse
//! each field.
//!
//! # Security Considerations
//!
//! - Field values are never logged, only keys and paths
//! - Credential material is carried as [`SecretString`] outside the store boundary

pub mod error;
pub mod memory;
pub mod store;
pub mod types;
pub mod vault;

pub use error::{Result, SecretsError};
pub use memory::MemorySecretStore;
pub use store::{field_map_from_json, FieldMap, SecretStore, StoredValue};
pub use types::SecretString;
pub use vault::{AppRoleConfig, VaultConfig, VaultSecretStore};
