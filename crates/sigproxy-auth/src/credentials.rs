//! Credential types, the provider trait, and provider implementations.
//!
//! The forwarder asks a [`CredentialProvider`] for a fresh [`Credentials`]
//! snapshot on every request and never caches it. Providers that talk to the
//! network are wrapped in a [`RefreshingCredentialProvider`], which keeps the
//! current snapshot in memory and renews it in the background ahead of expiry,
//! so readers never wait on a network call.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AuthError;

/// How long before expiry a snapshot is renewed.
const REFRESH_AHEAD: TimeDelta = TimeDelta::minutes(5);

/// Lower bound between two renewal attempts.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// A point-in-time set of signing credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
    expiry: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Create long-lived credentials without a session token.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expiry: None,
        }
    }

    /// Attach a session token (temporary credentials).
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Attach an expiry time.
    #[must_use]
    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// The access key ID.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The secret access key.
    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// The session token, for temporary credentials.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// When these credentials stop being valid, if they expire at all.
    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// Whether the credentials are expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Source of the current signing credentials.
///
/// Implementations must be safe to call concurrently from any number of
/// in-flight requests.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return the current credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialsUnavailable`] or
    /// [`AuthError::CredentialsExpired`] when no usable credentials exist.
    async fn credentials(&self) -> Result<Credentials, AuthError>;
}

/// A provider that always returns the same credentials.
///
/// # Examples
///
/// ```
/// use sigproxy_auth::credentials::{CredentialProvider, Credentials, StaticCredentialProvider};
///
/// # tokio_test::block_on(async {
/// let provider = StaticCredentialProvider::new(Credentials::new("AKID", "secret"));
/// let creds = provider.credentials().await.unwrap();
/// assert_eq!(creds.access_key_id(), "AKID");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credentials: Credentials,
}

impl StaticCredentialProvider {
    /// Create a provider serving `credentials`.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait::async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn credentials(&self) -> Result<Credentials, AuthError> {
        if self.credentials.is_expired_at(Utc::now()) {
            if let Some(expiry) = self.credentials.expiry() {
                return Err(AuthError::CredentialsExpired(expiry));
            }
        }
        Ok(self.credentials.clone())
    }
}

/// Keeps an in-memory snapshot of a slower provider and renews it in the background.
///
/// The initial snapshot is fetched by [`start`](Self::start); a failure there
/// is returned to the caller (fatal at startup). Renewal runs on a tokio task
/// that wakes [`REFRESH_AHEAD`] before expiry; failed renewals are logged and
/// retried. Credentials without an expiry are never renewed.
pub struct RefreshingCredentialProvider {
    current: Arc<RwLock<Credentials>>,
    refresher: Option<JoinHandle<()>>,
}

impl RefreshingCredentialProvider {
    /// Fetch the initial snapshot from `source` and start background renewal.
    pub async fn start(source: Arc<dyn CredentialProvider>) -> Result<Self, AuthError> {
        let initial = source.credentials().await?;
        info!(
            access_key_id = %initial.access_key_id(),
            expiry = ?initial.expiry(),
            "obtained initial credentials"
        );

        let renews = initial.expiry().is_some();
        let current = Arc::new(RwLock::new(initial));
        let refresher =
            renews.then(|| tokio::spawn(refresh_loop(source, Arc::clone(&current))));

        Ok(Self { current, refresher })
    }
}

impl fmt::Debug for RefreshingCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshingCredentialProvider")
            .field("current", &*self.current.read())
            .field("renewing", &self.refresher.is_some())
            .finish()
    }
}

impl Drop for RefreshingCredentialProvider {
    fn drop(&mut self) {
        if let Some(handle) = &self.refresher {
            handle.abort();
        }
    }
}

#[async_trait::async_trait]
impl CredentialProvider for RefreshingCredentialProvider {
    async fn credentials(&self) -> Result<Credentials, AuthError> {
        let snapshot = self.current.read().clone();
        match snapshot.expiry() {
            Some(expiry) if snapshot.is_expired_at(Utc::now()) => {
                Err(AuthError::CredentialsExpired(expiry))
            }
            _ => Ok(snapshot),
        }
    }
}

/// Renew `current` from `source` until the snapshot stops expiring.
async fn refresh_loop(source: Arc<dyn CredentialProvider>, current: Arc<RwLock<Credentials>>) {
    loop {
        let Some(expiry) = current.read().expiry() else {
            return;
        };
        tokio::time::sleep(refresh_delay(expiry, Utc::now())).await;

        // The lock is only taken to swap the snapshot, never across the fetch.
        match source.credentials().await {
            Ok(fresh) => {
                debug!(
                    access_key_id = %fresh.access_key_id(),
                    expiry = ?fresh.expiry(),
                    "renewed credentials"
                );
                *current.write() = fresh;
            }
            Err(e) => {
                warn!(error = %e, %expiry, "failed to renew credentials, will retry");
            }
        }
    }
}

/// Time to wait before renewing credentials that expire at `expiry`.
fn refresh_delay(expiry: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expiry - REFRESH_AHEAD - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .max(MIN_REFRESH_INTERVAL)
}
