//! Error types for SigV4 signing and credential resolution.
//!
//! All signing and credential failures are represented by [`AuthError`]. Every
//! variant means the request must not be sent upstream.

/// Errors that can occur while resolving credentials or signing a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A header required for signing is missing from the outgoing request.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// A header that must be signed carries a value that is not visible ASCII.
    #[error("Header {0} has a value that cannot be signed")]
    InvalidHeaderValue(String),

    /// The signing region or service name is empty.
    #[error("Signing {0} must not be empty")]
    EmptyScope(&'static str),

    /// The credential source could not produce credentials.
    #[error("Credentials unavailable: {0}")]
    CredentialsUnavailable(String),

    /// The most recent credential snapshot has expired and has not been renewed yet.
    #[error("Credentials expired at {0}")]
    CredentialsExpired(chrono::DateTime<chrono::Utc>),
}
