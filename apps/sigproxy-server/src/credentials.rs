//! AWS credential sources backing the signing forwarder.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use chrono::{DateTime, Utc};
use sigproxy_auth::{AuthError, CredentialProvider, Credentials};
use tracing::info;

/// Region used for STS when neither an override nor an ambient region is set.
const FALLBACK_REGION: &str = "us-east-1";

/// Role session names are limited to 64 characters.
const MAX_SESSION_NAME_LEN: usize = 64;

/// Credentials from the AWS default provider chain, optionally exchanged for
/// an assumed role.
pub struct AwsCredentialSource {
    provider: SharedCredentialsProvider,
}

impl fmt::Debug for AwsCredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentialSource").finish_non_exhaustive()
    }
}

impl AwsCredentialSource {
    /// Load the default chain. With `role_arn`, credentials come from STS
    /// `AssumeRole` using the chain as the source identity.
    pub async fn load(region: Option<&str>, role_arn: Option<&str>) -> Result<Self> {
        let region_provider =
            RegionProviderChain::first_try(region.map(|r| Region::new(r.to_owned())))
                .or_default_provider()
                .or_else(Region::new(FALLBACK_REGION));
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let provider = match role_arn {
            Some(arn) => {
                let session_name = role_session_name();
                info!(role_arn = %arn, %session_name, "assuming role for signing credentials");
                let assume_role = AssumeRoleProvider::builder(arn)
                    .session_name(session_name)
                    .configure(&sdk_config)
                    .build()
                    .await;
                SharedCredentialsProvider::new(assume_role)
            }
            None => sdk_config
                .credentials_provider()
                .ok_or_else(|| anyhow::anyhow!("no AWS credentials provider is configured"))?,
        };

        Ok(Self { provider })
    }
}

#[async_trait]
impl CredentialProvider for AwsCredentialSource {
    async fn credentials(&self) -> Result<Credentials, AuthError> {
        let creds = self
            .provider
            .provide_credentials()
            .await
            .map_err(|e| AuthError::CredentialsUnavailable(e.to_string()))?;

        let mut out = Credentials::new(creds.access_key_id(), creds.secret_access_key());
        if let Some(token) = creds.session_token() {
            out = out.with_session_token(token);
        }
        if let Some(expiry) = creds.expiry() {
            out = out.with_expiry(DateTime::<Utc>::from(expiry));
        }
        Ok(out)
    }
}

/// `sigproxy-<hostname>`, or `sigproxy-<unix seconds>` when the hostname is unknown.
fn role_session_name() -> String {
    session_name_for(whoami::fallible::hostname().ok(), SystemTime::now())
}

fn session_name_for(hostname: Option<String>, now: SystemTime) -> String {
    let suffix = hostname
        .map(|h| h.trim().to_owned())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| {
            now.duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
                .to_string()
        });
    sanitize_session_name(&format!("sigproxy-{suffix}"))
}

/// Keep only characters STS accepts in a role session name.
fn sanitize_session_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || "+=,.@-_".contains(*c))
        .take(MAX_SESSION_NAME_LEN)
        .collect()
}
