//! AWS STS `GetSessionToken` through the AWS SDK.

use async_trait::async_trait;
use aws_sdk_sts::config::retry::RetryConfig;
use aws_sdk_sts::config::timeout::TimeoutConfig;
use aws_sdk_sts::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sts::operation::get_session_token::GetSessionTokenError;
use aws_smithy_async::time::TimeSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use url::Url;
use validator::Validate;

use super::{LongLivedCredential, MintError, MintedCredential, TokenMinter};
use crate::clock::{system_clock, Clock};
use crate::errors::{Error, Result};
use crate::secrets::SecretString;

const CREDENTIALS_SOURCE: &str = "vaultcreds";

/// Configuration for [`StsTokenMinter`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StsConfig {
    /// STS endpoint (default: the global `https://sts.amazonaws.com`)
    #[serde(default = "default_endpoint")]
    #[validate(url(message = "STS endpoint must be a valid URL"))]
    pub endpoint: String,

    /// Signing region (default: "us-east-1")
    #[serde(default = "default_region")]
    #[validate(length(min = 1, message = "Region cannot be empty"))]
    pub region: String,

    /// Optional per-call timeout; the engine itself never imposes one.
    pub timeout_seconds: Option<u64>,
}

fn default_endpoint() -> String {
    "https://sts.amazonaws.com".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for StsConfig {
    fn default() -> Self {
        Self { endpoint: default_endpoint(), region: default_region(), timeout_seconds: None }
    }
}

/// Feeds the crate clock to the SDK's request signer.
#[derive(Debug)]
struct ClockTimeSource(Arc<dyn Clock>);

impl TimeSource for ClockTimeSource {
    fn now(&self) -> SystemTime {
        self.0.now().into()
    }
}

/// [`TokenMinter`] that calls AWS STS.
///
/// The presented credential changes per call, so every mint runs on a client
/// configured with that credential as a static provider. Retries are off: a
/// one-time code is only worth one attempt.
#[derive(Debug, Clone)]
pub struct StsTokenMinter {
    endpoint: Url,
    region: String,
    timeout: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl StsTokenMinter {
    pub fn new(config: StsConfig) -> Result<Self> {
        Self::with_clock(config, system_clock())
    }

    /// # Errors
    ///
    /// [`Error::Config`] when the endpoint is not an absolute URL with a host.
    pub fn with_clock(config: StsConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            Error::config(format!("Invalid STS endpoint '{}': {}", config.endpoint, e))
        })?;
        if endpoint.host_str().is_none() {
            return Err(Error::config(format!("STS endpoint '{}' has no host", config.endpoint)));
        }
        if config.region.trim().is_empty() {
            return Err(Error::config("STS region cannot be empty"));
        }

        Ok(Self {
            endpoint,
            region: config.region,
            timeout: config.timeout_seconds.map(Duration::from_secs),
            clock,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn client_for(&self, credential: &LongLivedCredential) -> aws_sdk_sts::Client {
        let session_token = Some(credential.session_token.expose_secret())
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        let credentials = Credentials::new(
            credential.access_key_id.as_str(),
            credential.secret_access_key.expose_secret(),
            session_token,
            None,
            CREDENTIALS_SOURCE,
        );

        let mut builder = aws_sdk_sts::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .endpoint_url(self.endpoint.as_str().trim_end_matches('/'))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .time_source(ClockTimeSource(Arc::clone(&self.clock)));
        if let Some(timeout) = self.timeout {
            builder =
                builder.timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build());
        }

        aws_sdk_sts::Client::from_conf(builder.build())
    }
}

/// Sort an SDK failure into the minter's error kinds.
fn classify(err: SdkError<GetSessionTokenError>) -> MintError {
    match err {
        SdkError::ServiceError(ref context) => {
            let service_error = context.err();
            match service_error.code() {
                Some(code) => {
                    MintError::rejected(code, service_error.message().unwrap_or_default())
                }
                // An answer without an error code is not an STS reply at all.
                None => MintError::invalid_response(DisplayErrorContext(&err).to_string()),
            }
        }
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            MintError::transport(DisplayErrorContext(&err).to_string())
        }
        SdkError::ResponseError(_) => {
            MintError::invalid_response(DisplayErrorContext(&err).to_string())
        }
        _ => MintError::invalid_request(DisplayErrorContext(&err).to_string()),
    }
}

fn to_chrono(timestamp: &aws_sdk_sts::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

#[async_trait]
impl TokenMinter for StsTokenMinter {
    async fn mint(
        &self,
        credential: &LongLivedCredential,
        mfa_serial: &str,
        code: &str,
        duration_secs: i64,
    ) -> std::result::Result<MintedCredential, MintError> {
        let duration = i32::try_from(duration_secs).map_err(|_| {
            MintError::invalid_request(format!("Duration {}s is out of range", duration_secs))
        })?;

        tracing::debug!(
            endpoint = %self.endpoint,
            access_key_id = %credential.access_key_id,
            mfa_serial = %mfa_serial,
            duration_secs,
            "Requesting session token from STS"
        );

        let output = self
            .client_for(credential)
            .get_session_token()
            .duration_seconds(duration)
            .serial_number(mfa_serial)
            .token_code(code)
            .send()
            .await
            .map_err(|e| {
                let err = classify(e);
                tracing::warn!(
                    error = %err,
                    endpoint = %self.endpoint,
                    "STS GetSessionToken failed"
                );
                err
            })?;

        let creds = output
            .credentials()
            .ok_or_else(|| MintError::invalid_response("GetSessionToken returned no credentials"))?;
        let expiration = to_chrono(creds.expiration()).ok_or_else(|| {
            MintError::invalid_response(format!("Invalid expiration {:?}", creds.expiration()))
        })?;

        let minted = MintedCredential {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: SecretString::new(creds.secret_access_key()),
            session_token: SecretString::new(creds.session_token()),
            expiration,
        };
        tracing::info!(
            access_key_id = %minted.access_key_id,
            expiration = %minted.expiration,
            "Obtained session token from STS"
        );
        Ok(minted)
    }
}
