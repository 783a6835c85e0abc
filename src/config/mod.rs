//! # Configuration Management
//!
//! Settings for the Vault store, the STS minter and logging, read from environment
//! variables and validated before use.
//!
//! | Variable | Default |
//! |---|---|
//! | `VAULT_ADDR` | `http://127.0.0.1:8200` |
//! | `VAULT_TOKEN` | none |
//! | `VAULT_NAMESPACE` | none |
//! | `VAULT_MOUNT_PATH` | `secret` |
//! | `VAULTCREDS_SECRETS_PATH` | `awskeys/` |
//! | `VAULT_ROLE_ID` | none, enables AppRole |
//! | `VAULT_APPROLE_MOUNT` | `approle` |
//! | `VAULT_SECRET_ID` | none |
//! | `VAULT_SECRET_ID_FILE` | none |
//! | `VAULTCREDS_STS_ENDPOINT` | `https://sts.amazonaws.com` |
//! | `VAULTCREDS_STS_REGION` | `us-east-1` |
//! | `VAULTCREDS_STS_TIMEOUT_SECONDS` | none |
//! | `VAULTCREDS_LOG_LEVEL` | `info` |
//! | `VAULTCREDS_LOG_JSON` | `false` |

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::errors::{Error, Result};
use crate::secrets::{AppRoleConfig, VaultConfig};
use crate::sts::StsConfig;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub vault: VaultConfig,

    #[validate(nested)]
    pub sts: StsConfig,

    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. "info" or "vaultcreds=debug"
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_bool(name: &str) -> Result<bool> {
    match env_opt(name) {
        None => Ok(false),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::config(format!("Invalid {}: '{}' is not a boolean", name, value))),
        },
    }
}

impl Config {
    /// Read configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let approle = env_opt("VAULT_ROLE_ID").map(|role_id| AppRoleConfig {
            mount: env_opt("VAULT_APPROLE_MOUNT").unwrap_or_else(|| "approle".to_string()),
            role_id,
            secret_id: env_opt("VAULT_SECRET_ID"),
            secret_id_file: env_opt("VAULT_SECRET_ID_FILE").map(PathBuf::from),
        });

        let vault = VaultConfig {
            address: env_opt("VAULT_ADDR").unwrap_or(defaults.vault.address),
            token: env_opt("VAULT_TOKEN"),
            namespace: env_opt("VAULT_NAMESPACE"),
            mount_path: env_opt("VAULT_MOUNT_PATH").unwrap_or(defaults.vault.mount_path),
            secrets_path: env_opt("VAULTCREDS_SECRETS_PATH")
                .unwrap_or(defaults.vault.secrets_path),
            approle,
        };

        let timeout_seconds = env_opt("VAULTCREDS_STS_TIMEOUT_SECONDS")
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|e| Error::config(format!("Invalid STS timeout '{}': {}", v, e)))
            })
            .transpose()?;

        let sts = StsConfig {
            endpoint: env_opt("VAULTCREDS_STS_ENDPOINT").unwrap_or(defaults.sts.endpoint),
            region: env_opt("VAULTCREDS_STS_REGION").unwrap_or(defaults.sts.region),
            timeout_seconds,
        };

        let logging = LoggingConfig {
            level: env_opt("VAULTCREDS_LOG_LEVEL").unwrap_or(defaults.logging.level),
            json: env_bool("VAULTCREDS_LOG_JSON")?,
        };

        let config = Self { vault, sts, logging };
        config.validate()?;
        Ok(config)
    }

    /// Field validation plus the checks that span several fields.
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)?;

        match self.vault.approle {
            Some(ref approle)
                if approle.secret_id.is_none() && approle.secret_id_file.is_none() =>
            {
                Err(Error::config(
                    "VAULT_ROLE_ID is set but neither VAULT_SECRET_ID nor VAULT_SECRET_ID_FILE is",
                ))
            }
            Some(_) => Ok(()),
            None if self.vault.token.is_none() => {
                Err(Error::config("Either VAULT_TOKEN or VAULT_ROLE_ID must be set"))
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "VAULT_ADDR",
        "VAULT_TOKEN",
        "VAULT_NAMESPACE",
        "VAULT_MOUNT_PATH",
        "VAULTCREDS_SECRETS_PATH",
        "VAULT_ROLE_ID",
        "VAULT_APPROLE_MOUNT",
        "VAULT_SECRET_ID",
        "VAULT_SECRET_ID_FILE",
        "VAULTCREDS_STS_ENDPOINT",
        "VAULTCREDS_STS_REGION",
        "VAULTCREDS_STS_TIMEOUT_SECONDS",
        "VAULTCREDS_LOG_LEVEL",
        "VAULTCREDS_LOG_JSON",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults_with_token() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("VAULT_TOKEN", "s.test");

        let config = Config::from_env().unwrap();
        assert_eq!(config.vault.address, "http://127.0.0.1:8200");
        assert_eq!(config.vault.mount_path, "secret");
        assert_eq!(config.vault.secrets_path, "awskeys/");
        assert_eq!(config.vault.token.as_deref(), Some("s.test"));
        assert!(config.vault.approle.is_none());
        assert_eq!(config.sts.endpoint, "https://sts.amazonaws.com");
        assert_eq!(config.sts.region, "us-east-1");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);

        clear_env();
    }

    #[test]
    fn test_approle_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("VAULT_ADDR", "https://vault.example.com:8200");
        std::env::set_var("VAULT_ROLE_ID", "role-123");
        std::env::set_var("VAULT_SECRET_ID_FILE", "/etc/vaultcreds/secret-id.json");
        std::env::set_var("VAULTCREDS_SECRETS_PATH", "team/aws/");
        std::env::set_var("VAULTCREDS_LOG_JSON", "true");

        let config = Config::from_env().unwrap();
        let approle = config.vault.approle.unwrap();
        assert_eq!(approle.role_id, "role-123");
        assert_eq!(approle.mount, "approle");
        assert_eq!(approle.secret_id_file, Some(PathBuf::from("/etc/vaultcreds/secret-id.json")));
        assert_eq!(config.vault.secrets_path, "team/aws/");
        assert!(config.logging.json);

        clear_env();
    }

    #[test]
    fn test_missing_auth_is_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("VAULT_TOKEN"));

        std::env::set_var("VAULT_ROLE_ID", "role-123");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("VAULT_SECRET_ID"));

        clear_env();
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("VAULT_TOKEN", "s.test");

        std::env::set_var("VAULT_ADDR", "not a url");
        let err = Config::from_env().unwrap_err();
        assert_eq!(err.stage(), "config");
        assert!(err.to_string().contains("vault.address"));
        std::env::remove_var("VAULT_ADDR");

        std::env::set_var("VAULTCREDS_LOG_JSON", "maybe");
        assert!(Config::from_env().is_err());
        std::env::remove_var("VAULTCREDS_LOG_JSON");

        std::env::set_var("VAULTCREDS_STS_TIMEOUT_SECONDS", "-5");
        assert!(Config::from_env().is_err());

        clear_env();
    }
}
