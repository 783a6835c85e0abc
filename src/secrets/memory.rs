//! In-process secret store.
//!
//! Keeps mappings in memory only. Used by tests and by the CLI's `--dry-run` mode;
//! nothing survives a restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::error::{Result, SecretsError};
use super::store::{FieldMap, SecretStore};

/// In-memory [`SecretStore`].
///
/// Clones share the same underlying map, so a test can hand one clone to an engine
/// and inspect another.
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    entries: Arc<RwLock<HashMap<String, FieldMap>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a mapping directly, bypassing the unavailable switch.
    pub async fn insert(&self, key: impl Into<String>, fields: FieldMap) {
        self.entries.write().await.insert(key.into(), fields);
    }

    /// Peek at a stored mapping without going through [`SecretStore::read`].
    pub async fn get(&self, key: &str) -> Option<FieldMap> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Make every subsequent operation fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SecretsError::connection_failed("in-memory store marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn read(&self, key: &str) -> Result<Option<FieldMap>> {
        self.check_available()?;
        let entries = self.entries.read().await;
        tracing::debug!(key = %key, found = entries.contains_key(key), "Read from memory store");
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, key: &str, fields: &FieldMap) -> Result<()> {
        self.check_available()?;
        self.entries.write().await.insert(key.to_string(), fields.clone());
        tracing::debug!(key = %key, fields = fields.len(), "Wrote to memory store");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries.write().await.remove(key);
        tracing::debug!(key = %key, "Deleted from memory store");
        Ok(())
    }
}
