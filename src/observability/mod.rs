//! # Observability
//!
//! Structured logging through `tracing`. Secret values never reach a log field: they
//! travel as [`SecretString`](crate::secrets::SecretString), whose `Display` and
//! `Debug` are redacted.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::errors::{Error, Result};

/// Install the global subscriber.
///
/// Logs go to stderr so stdout stays clean for `credential_process` output.
/// `RUST_LOG` wins over the configured level when set. Installing twice is not an
/// error, so tests and embedding applications can call this freely.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&config.level),
    }
    .map_err(|e| Error::config(format!("Invalid log level '{}': {}", config.level, e)))?;

    // A subscriber may already be set (integration tests, embedding apps).
    let _ = if config.json {
        tracing::subscriber::set_global_default(
            fmt()
                .json()
                .with_env_filter(filter)
                .with_current_span(true)
                .with_writer(std::io::stderr)
                .finish(),
        )
    } else {
        tracing::subscriber::set_global_default(
            fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).finish(),
        )
    };

    Ok(())
}
