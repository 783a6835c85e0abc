use std::sync::Arc;
use tokio::sync::Mutex;

use super::engine::{Credentials, VaultCredsProvider};
use crate::errors::Result;

#[derive(Debug)]
struct Inner {
    provider: VaultCredsProvider,
    cached: Option<Credentials>,
}

/// A provider shared between tasks that hands out cached credentials until they expire.
#[derive(Debug, Clone)]
pub struct SharedProvider {
    inner: Arc<Mutex<Inner>>,
}

impl SharedProvider {
    pub fn new(provider: VaultCredsProvider) -> Self {
        Self { inner: Arc::new(Mutex::new(Inner { provider, cached: None })) }
    }

    /// Cached credentials while they are fresh, otherwise a new `retrieve`.
    ///
    /// After a failed `retrieve` nothing is cached, so the next call tries again.
    ///
    /// Callers queue on the lock, so concurrent expiry triggers a single retrieve.
    pub async fn credentials(&self) -> Result<Credentials> {
        let mut inner = self.inner.lock().await;

        if let Some(ref cached) = inner.cached {
            if !inner.provider.is_expired() {
                tracing::trace!(identity = %inner.provider.identity(), "Using cached credentials");
                return Ok(cached.clone());
            }
        }

        // A failed reload can still move the boundary forward; never serve the old set
        // past it.
        inner.cached = None;
        let fresh = inner.provider.retrieve().await?;
        inner.cached = Some(fresh.clone());
        Ok(fresh)
    }

    pub async fn is_expired(&self) -> bool {
        self.inner.lock().await.provider.is_expired()
    }

    /// Drop the cached credentials so the next call retrieves.
    pub async fn invalidate(&self) {
        self.inner.lock().await.cached = None;
    }

    pub async fn save(&self) -> Result<()> {
        self.inner.lock().await.provider.save().await
    }
}
