//! HashiCorp Vault secret store.
//!
//! Credential records live in a KV v2 mount, one secret per identity key, at
//! `{mount_path}/{secrets_path}{key}`. The store authenticates either with a static
//! token or with AppRole; an AppRole login is repeated whenever its lease has lapsed,
//! right before the next operation.
//!
//! # Example
//!
//! ```rust,ignore
//! use vaultcreds::config::Config;
//! use vaultcreds::secrets::VaultSecretStore;
//!
//! let store = VaultSecretStore::new(Config::from_env()?.vault).await?;
//! let fields = store.read("arn:aws:iam::123456789012:user/ci").await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use validator::Validate;
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;

use super::error::{Result, SecretsError};
use super::store::{field_map_from_json, FieldMap, SecretStore};

/// Leases are renewed this long before Vault would expire them.
const LEASE_RENEW_MARGIN: Duration = Duration::from_secs(10);

/// AppRole credentials for logging in to Vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRoleConfig {
    /// AppRole auth mount (default: "approle")
    #[serde(default = "default_approle_mount")]
    pub mount: String,

    pub role_id: String,

    /// Secret id given inline; takes precedence over `secret_id_file`.
    #[serde(skip_serializing)]
    pub secret_id: Option<String>,

    /// JSON file of the form `{"SecretID": "..."}`.
    pub secret_id_file: Option<PathBuf>,
}

fn default_approle_mount() -> String {
    "approle".to_string()
}

#[derive(Deserialize)]
struct SecretIdFile {
    #[serde(rename = "SecretID")]
    secret_id: String,
}

impl AppRoleConfig {
    /// Resolve the secret id, reading the secret id file when no inline value is set.
    pub async fn resolve_secret_id(&self) -> Result<String> {
        if let Some(ref secret_id) = self.secret_id {
            return Ok(secret_id.clone());
        }
        let path = self.secret_id_file.as_ref().ok_or_else(|| {
            SecretsError::config_error("AppRole needs either a secret id or a secret id file")
        })?;
        let raw = tokio::fs::read_to_string(path).await?;
        let file: SecretIdFile = serde_json::from_str(&raw)?;
        Ok(file.secret_id)
    }
}

/// Configuration for the Vault secret store.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VaultConfig {
    /// Vault server address (e.g., "https://vault.example.com:8200")
    #[validate(url(message = "Vault address must be a valid URL"))]
    pub address: String,

    /// Static token (ignored when `approle` is set)
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// Vault namespace (Enterprise)
    pub namespace: Option<String>,

    /// KV v2 mount path (default: "secret")
    #[serde(default = "default_mount_path")]
    #[validate(length(min = 1, message = "Mount path cannot be empty"))]
    pub mount_path: String,

    /// Prefix prepended to every identity key (default: "awskeys/")
    #[serde(default = "default_secrets_path")]
    pub secrets_path: String,

    pub approle: Option<AppRoleConfig>,
}

fn default_mount_path() -> String {
    "secret".to_string()
}

fn default_secrets_path() -> String {
    "awskeys/".to_string()
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8200".to_string(),
            token: None,
            namespace: None,
            mount_path: default_mount_path(),
            secrets_path: default_secrets_path(),
            approle: None,
        }
    }
}

struct Session {
    client: Arc<VaultClient>,
    lease_expires_at: Option<Instant>,
}

/// [`SecretStore`] backed by Vault KV v2.
pub struct VaultSecretStore {
    session: Mutex<Session>,
    address: String,
    namespace: Option<String>,
    approle: Option<AppRoleConfig>,
    mount_path: String,
    secrets_path: String,
}

impl std::fmt::Debug for VaultSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSecretStore")
            .field("mount_path", &self.mount_path)
            .field("secrets_path", &self.secrets_path)
            .field("approle", &self.approle.as_ref().map(|a| &a.role_id))
            .finish()
    }
}

impl VaultSecretStore {
    /// Create the store and, for AppRole, perform the first login.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::ConfigError`] if the configuration is invalid
    /// - [`SecretsError::ConnectionFailed`] if the client cannot be built
    /// - [`SecretsError::AuthenticationFailed`] if the AppRole login is refused
    pub async fn new(config: VaultConfig) -> Result<Self> {
        if config.address.is_empty() {
            return Err(SecretsError::config_error("Vault address cannot be empty"));
        }
        if config.token.is_none() && config.approle.is_none() {
            return Err(SecretsError::config_error(
                "Vault needs either a token or AppRole credentials",
            ));
        }

        let client = Self::build_client(
            &config.address,
            config.namespace.as_deref(),
            config.token.as_deref(),
        )?;

        let store = Self {
            session: Mutex::new(Session { client: Arc::new(client), lease_expires_at: None }),
            address: config.address,
            namespace: config.namespace,
            approle: config.approle,
            mount_path: config.mount_path,
            secrets_path: config.secrets_path,
        };

        if store.approle.is_some() {
            let mut session = store.session.lock().await;
            store.login(&mut session).await?;
        }

        tracing::info!(
            address = %store.address,
            mount_path = %store.mount_path,
            auth = if store.approle.is_some() { "approle" } else { "token" },
            "Configured Vault secret store"
        );

        Ok(store)
    }

    fn build_client(
        address: &str,
        namespace: Option<&str>,
        token: Option<&str>,
    ) -> Result<VaultClient> {
        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(address);

        if let Some(token) = token {
            settings_builder.token(token);
        }

        if let Some(namespace) = namespace {
            settings_builder.namespace(Some(namespace.to_string()));
        }

        let settings = settings_builder.build().map_err(|e| {
            SecretsError::config_error(format!("Invalid Vault configuration: {}", e))
        })?;

        VaultClient::new(settings).map_err(|e| {
            SecretsError::connection_failed(format!("Failed to create Vault client: {}", e))
        })
    }

    async fn login(&self, session: &mut Session) -> Result<()> {
        let Some(ref approle) = self.approle else {
            return Ok(());
        };

        let secret_id = approle.resolve_secret_id().await?;
        let auth = vaultrs::auth::approle::login(
            session.client.as_ref(),
            &approle.mount,
            &approle.role_id,
            &secret_id,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, role_id = %approle.role_id, "Vault AppRole login failed");
            SecretsError::authentication_failed(format!("AppRole login failed: {}", e))
        })?;

        let client = Self::build_client(
            &self.address,
            self.namespace.as_deref(),
            Some(&auth.client_token),
        )?;
        session.client = Arc::new(client);
        let lease_seconds = u64::from(auth.lease_duration);
        session.lease_expires_at = if lease_seconds == 0 {
            None
        } else {
            Duration::from_secs(lease_seconds)
                .checked_sub(LEASE_RENEW_MARGIN)
                .map(|lease| Instant::now() + lease)
                .or(Some(Instant::now()))
        };

        tracing::debug!(lease_seconds, "Logged in to Vault with AppRole");
        Ok(())
    }

    /// A client with a live token, logging in again first if the lease has lapsed.
    ///
    /// The lock covers only the lease check and login; requests run on the returned
    /// handle without it.
    async fn client(&self) -> Result<Arc<VaultClient>> {
        let mut session = self.session.lock().await;
        let lapsed = session.lease_expires_at.is_some_and(|expires| Instant::now() >= expires);
        if lapsed {
            tracing::debug!("Vault token lease lapsed, logging in again");
            self.login(&mut session).await?;
        }
        Ok(Arc::clone(&session.client))
    }

    /// Full KV path for an identity key.
    pub fn secret_path(&self, key: &str) -> String {
        let prefix = self.secrets_path.trim_matches('/');
        let key = key.trim_start_matches('/');
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", prefix, key)
        }
    }

    fn map_client_error(key: &str, operation: &str, e: ClientError) -> SecretsError {
        match e {
            ClientError::APIError { code: 401 | 403, errors } => {
                SecretsError::authentication_failed(format!(
                    "Vault refused {} on '{}': {}",
                    operation,
                    key,
                    errors.join("; ")
                ))
            }
            ClientError::APIError { code, errors } => SecretsError::backend_error(
                key,
                format!("{} returned {}: {}", operation, code, errors.join("; ")),
            ),
            other => SecretsError::connection_failed(format!(
                "{} on '{}' failed: {}",
                operation, key, other
            )),
        }
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn read(&self, key: &str) -> Result<Option<FieldMap>> {
        let path = self.secret_path(key);
        let client = self.client().await?;

        let secret: HashMap<String, serde_json::Value> =
            match kv2::read(client.as_ref(), &self.mount_path, &path).await {
                Ok(secret) => secret,
                Err(ClientError::APIError { code: 404, .. }) => {
                    tracing::debug!(path = %path, "No credential record stored in Vault");
                    return Ok(None);
                }
                Err(e) => {
                    tracing::error!(error = %e, path = %path, "Failed to read secret from Vault");
                    return Err(Self::map_client_error(key, "read", e));
                }
            };

        let object = serde_json::Value::Object(secret.into_iter().collect());
        Ok(field_map_from_json(object))
    }

    async fn write(&self, key: &str, fields: &FieldMap) -> Result<()> {
        let path = self.secret_path(key);
        let client = self.client().await?;

        kv2::set(client.as_ref(), &self.mount_path, &path, fields).await.map_err(|e| {
            tracing::error!(error = %e, path = %path, "Failed to write secret to Vault");
            Self::map_client_error(key, "write", e)
        })?;

        tracing::info!(
            path = %path,
            mount_path = %self.mount_path,
            "Stored credential record in Vault"
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.secret_path(key);
        let client = self.client().await?;

        // Metadata delete removes every version, not just the latest.
        kv2::delete_metadata(client.as_ref(), &self.mount_path, &path).await.map_err(|e| {
            tracing::error!(error = %e, path = %path, "Failed to delete secret from Vault");
            Self::map_client_error(key, "delete", e)
        })?;

        tracing::info!(
            path = %path,
            mount_path = %self.mount_path,
            "Deleted credential record from Vault"
        );
        Ok(())
    }
}
