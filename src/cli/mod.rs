//! # Command Line Interface
//!
//! `vaultcreds` manages credential records in Vault and serves them to SDKs through
//! the `credential_process` hook:
//!
//! ```text
//! [profile ci]
//! credential_process = vaultcreds retrieve arn:aws:iam::123456789012:user/ci
//! ```

pub mod output;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::sync::Arc;

use crate::config::Config;
use crate::mfa::TotpGenerator;
use crate::observability::init_logging;
use crate::provider::VaultCredsProvider;
use crate::secrets::{MemorySecretStore, SecretStore, SecretString, VaultSecretStore};
use crate::sts::StsTokenMinter;
use output::{OutputFormat, ProcessCredentials, RecordSummary};

#[derive(Parser)]
#[command(name = "vaultcreds")]
#[command(about = "Cloud credentials kept in Vault, with TOTP MFA step-up")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use an in-memory store instead of Vault; nothing is persisted
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a credential record
    Store(StoreArgs),

    /// Show the non-secret fields of a record and whether it needs a reload
    Show {
        /// Identity key, usually an IAM ARN
        identity: String,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Print credentials as `credential_process` JSON, minting with MFA when configured
    Retrieve {
        /// Identity key, usually an IAM ARN
        identity: String,
    },

    /// Remove a record
    Delete {
        /// Identity key, usually an IAM ARN
        identity: String,
    },
}

#[derive(clap::Args)]
pub struct StoreArgs {
    /// Identity key, usually an IAM ARN
    pub identity: String,

    #[arg(long)]
    pub access_key_id: String,

    /// Read from stdin when omitted
    #[arg(long)]
    pub secret_access_key: Option<String>,

    #[arg(long)]
    pub session_token: Option<String>,

    /// RFC 3339 timestamp
    #[arg(long)]
    pub expiration: Option<DateTime<Utc>>,

    /// Seconds to trust a credential; negative disables caching
    #[arg(long, allow_negative_numbers = true)]
    pub ttl: Option<i64>,

    #[arg(long)]
    pub name: Option<String>,

    /// MFA device ARN
    #[arg(long, requires = "mfa_secret")]
    pub mfa_serial: Option<String>,

    /// Base32 TOTP seed of the virtual MFA device
    #[arg(long, requires = "mfa_serial")]
    pub mfa_secret: Option<String>,
}

/// Run CLI commands
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.dry_run { dry_run_config()? } else { Config::from_env()? };
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    init_logging(&logging)?;

    let store: Arc<dyn SecretStore> = if cli.dry_run {
        tracing::warn!("Dry run: using an in-memory store");
        Arc::new(MemorySecretStore::new())
    } else {
        Arc::new(VaultSecretStore::new(config.vault.clone()).await?)
    };

    match cli.command {
        Commands::Store(args) => handle_store(args, store, &config).await?,
        Commands::Show { identity, format } => {
            handle_show(&identity, format, store, &config).await?
        }
        Commands::Retrieve { identity } => handle_retrieve(&identity, store, &config).await?,
        Commands::Delete { identity } => {
            provider(&identity, store, &config)?.delete().await?;
            eprintln!("Deleted credential record for {}", identity);
        }
    }

    Ok(())
}

/// Environment configuration without the Vault auth requirement.
fn dry_run_config() -> Result<Config> {
    Ok(Config::from_env().unwrap_or_default())
}

fn provider(
    identity: &str,
    store: Arc<dyn SecretStore>,
    config: &Config,
) -> Result<VaultCredsProvider> {
    Ok(VaultCredsProvider::new(
        identity,
        store,
        Arc::new(TotpGenerator::default()),
        Arc::new(StsTokenMinter::new(config.sts.clone())?),
    ))
}

fn read_secret_from_stdin() -> Result<SecretString> {
    eprint!("Secret access key: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).context("Failed to read secret access key")?;
    let secret = line.trim();
    if secret.is_empty() {
        anyhow::bail!("Secret access key cannot be empty");
    }
    Ok(SecretString::new(secret))
}

async fn handle_store(args: StoreArgs, store: Arc<dyn SecretStore>, config: &Config) -> Result<()> {
    let secret = match args.secret_access_key {
        Some(secret) => SecretString::new(secret),
        None => read_secret_from_stdin()?,
    };

    if let Some(ref seed) = args.mfa_secret {
        TotpGenerator::decode_secret(&SecretString::new(seed.as_str()))
            .context("MFA secret is not a usable TOTP seed")?;
    }

    let mut builder = VaultCredsProvider::builder(args.identity.as_str())
        .access_key(args.access_key_id)
        .secret_access_key(secret);
    if let Some(token) = args.session_token {
        builder = builder.session_token(token);
    }
    if let Some(expiration) = args.expiration {
        builder = builder.expiration(expiration);
    }
    if let Some(ttl) = args.ttl {
        builder = builder.ttl(ttl);
    }
    if let Some(name) = args.name {
        builder = builder.name(name);
    }
    if let (Some(serial), Some(seed)) = (args.mfa_serial, args.mfa_secret) {
        builder = builder.with_mfa(serial, seed);
    }

    let provider = builder.build(
        store,
        Arc::new(TotpGenerator::default()),
        Arc::new(StsTokenMinter::new(config.sts.clone())?),
    );
    provider.save().await?;
    eprintln!("Stored credential record for {}", args.identity);
    Ok(())
}

async fn handle_show(
    identity: &str,
    format: OutputFormat,
    store: Arc<dyn SecretStore>,
    config: &Config,
) -> Result<()> {
    let mut provider = provider(identity, store, config)?;
    provider.load().await?;

    let summary =
        RecordSummary::new(identity, provider.record(), provider.is_expired(), provider.state());
    match format {
        OutputFormat::Json => output::print_json(&summary)?,
        OutputFormat::Table => output::print_summary_table(&summary),
    }
    Ok(())
}

async fn handle_retrieve(
    identity: &str,
    store: Arc<dyn SecretStore>,
    config: &Config,
) -> Result<()> {
    let mut provider = provider(identity, store, config)?;
    let credentials = provider.retrieve().await?;

    if credentials.access_key_id.is_empty() {
        anyhow::bail!("No credential record stored for {}", identity);
    }

    output::print_json(&ProcessCredentials::new(&credentials, &provider.record().expiration))
}
