//! Error types for the proxy pipeline.

use http::StatusCode;
use sigproxy_auth::AuthError;

/// Errors raised while handling a single proxied request, or while validating
/// configuration at startup.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The inbound request body could not be read in full.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// Neither a host override nor an inbound `Host` header is available.
    #[error("no destination host: set a host override or send a Host header")]
    MissingHost,

    /// Region or service name could not be resolved for the destination host.
    #[error("unable to determine signing {missing} for host {host}")]
    UnresolvableScope {
        /// The host that inference was attempted on.
        host: String,
        /// Which part of the scope is missing (`region` or `service`).
        missing: &'static str,
    },

    /// The rewritten upstream URL is not valid.
    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),

    /// Credentials could not be obtained or the request could not be signed.
    #[error(transparent)]
    Signing(#[from] AuthError),

    /// The upstream could not be reached (DNS, connect, TLS).
    #[error("upstream request failed: {0}")]
    UpstreamConnect(String),

    /// The upstream did not answer in time.
    #[error("upstream request timed out: {0}")]
    UpstreamTimeout(String),

    /// The upstream response body could not be read.
    #[error("failed to read upstream response body: {0}")]
    UpstreamBody(String),

    /// A locally emulated path was requested with a method it does not serve.
    #[error("no handler for {method} {path}")]
    NotFound {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// Invalid configuration detected at startup.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

impl ProxyError {
    /// HTTP status returned to the client for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BodyRead(_) => StatusCode::BAD_REQUEST,
            Self::MissingHost
            | Self::UnresolvableScope { .. }
            | Self::InvalidTarget(_)
            | Self::UpstreamConnect(_)
            | Self::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
            Self::Signing(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    /// Short machine-readable error type used in JSON error bodies.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BodyRead(_) => "request_body_exception",
            Self::MissingHost | Self::UnresolvableScope { .. } => "signing_scope_exception",
            Self::InvalidTarget(_) => "invalid_target_exception",
            Self::Signing(_) => "signing_exception",
            Self::UpstreamConnect(_) | Self::UpstreamBody(_) => "upstream_exception",
            Self::UpstreamTimeout(_) => "upstream_timeout_exception",
            Self::NotFound { .. } => "not_found_exception",
            Self::Config(_) => "configuration_exception",
        }
    }
}
