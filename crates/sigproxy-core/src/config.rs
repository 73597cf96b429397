//! Process-wide proxy configuration.
//!
//! Configuration is built once at startup (the server binary converts its
//! command line into these types) and shared read-only behind an `Arc` by every
//! request afterwards.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use http::{HeaderMap, HeaderName};
use typed_builder::TypedBuilder;

use crate::error::ProxyError;
use crate::scope::ScopeOverrides;

/// Default idle timeout of pooled upstream connections.
pub const DEFAULT_IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(40);

/// Set of header names removed from every forwarded request before signing.
///
/// Names are stored as [`HeaderName`], so matching is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripHeaders(Vec<HeaderName>);

impl StripHeaders {
    /// Parse a list of header names.
    ///
    /// Blank entries are ignored and duplicates are kept once.
    ///
    /// # Examples
    ///
    /// ```
    /// use sigproxy_core::StripHeaders;
    ///
    /// let strip = StripHeaders::from_names(["Authorization", "x-api-key", ""]).unwrap();
    /// assert_eq!(strip.len(), 2);
    /// ```
    pub fn from_names<I, S>(names: I) -> Result<Self, ProxyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed: Vec<HeaderName> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ProxyError::Config(format!("invalid header name to strip: {name}")))?;
            if !parsed.contains(&header) {
                parsed.push(header);
            }
        }
        Ok(Self(parsed))
    }

    /// Remove every configured header from `headers`.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for name in &self.0 {
            headers.remove(name);
        }
    }

    /// Configured header names.
    #[must_use]
    pub fn names(&self) -> &[HeaderName] {
        &self.0
    }

    /// Number of configured header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no headers are stripped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// URL scheme used for forwarded requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpstreamScheme {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    #[default]
    Https,
}

impl UpstreamScheme {
    /// The scheme as it appears in a URL.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for UpstreamScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpstreamScheme {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(ProxyError::Config(format!(
                "unsupported upstream scheme: {other}"
            ))),
        }
    }
}

/// Immutable configuration of the signing forwarder.
///
/// # Examples
///
/// ```
/// use sigproxy_core::ProxyConfig;
///
/// let config = ProxyConfig::builder()
///     .host_override(Some("abc.us-east-1.aoss.amazonaws.com".to_owned()))
///     .verbose(true)
///     .build();
/// assert!(config.should_log_signing());
/// assert!(config.should_log_failed_requests());
/// ```
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct ProxyConfig {
    /// Headers removed from every forwarded request.
    #[builder(default)]
    pub strip_headers: StripHeaders,

    /// Signing service name override.
    #[builder(default, setter(into))]
    pub service_override: Option<String>,

    /// Destination host override.
    #[builder(default, setter(into))]
    pub host_override: Option<String>,

    /// Signing region override.
    #[builder(default, setter(into))]
    pub region_override: Option<String>,

    /// Scheme of the forwarded request.
    #[builder(default)]
    pub upstream_scheme: UpstreamScheme,

    /// Verbose logging; implies both logging flags below.
    #[builder(default = false)]
    pub verbose: bool,

    /// Log the body of 4xx/5xx upstream responses.
    #[builder(default = false)]
    pub log_failed_requests: bool,

    /// Log canonical request and string to sign.
    #[builder(default = false)]
    pub log_signing: bool,
}

impl ProxyConfig {
    /// Whether failing upstream bodies are captured and logged.
    #[must_use]
    pub fn should_log_failed_requests(&self) -> bool {
        self.verbose || self.log_failed_requests
    }

    /// Whether the signing process is logged at `info`.
    #[must_use]
    pub fn should_log_signing(&self) -> bool {
        self.verbose || self.log_signing
    }

    /// Overrides consulted by scope resolution.
    #[must_use]
    pub fn scope_overrides(&self) -> ScopeOverrides<'_> {
        ScopeOverrides {
            host: self.host_override.as_deref(),
            region: self.region_override.as_deref(),
            service: self.service_override.as_deref(),
        }
    }
}

/// Upstream transport settings, applied once when the client is built.
#[derive(Debug, Clone, TypedBuilder)]
pub struct TransportConfig {
    /// Skip TLS certificate verification of the upstream.
    #[builder(default = false)]
    pub insecure_skip_verify: bool,

    /// How long an idle pooled connection is kept open.
    #[builder(default = DEFAULT_IDLE_CONN_TIMEOUT)]
    pub idle_conn_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            insecure_skip_verify: false,
            idle_conn_timeout: DEFAULT_IDLE_CONN_TIMEOUT,
        }
    }
}
