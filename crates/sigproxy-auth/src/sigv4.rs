//! AWS Signature Version 4 signing.
//!
//! This module implements the signing side of SigV4:
//!
//! 1. Collect the headers to sign: `host` plus every `x-amz-*` header, with the
//!    signer-owned headers (`x-amz-date`, `x-amz-content-sha256`,
//!    `x-amz-security-token`) replaced by freshly computed values.
//! 2. Build the canonical request from the method, path, query, headers and payload hash.
//! 3. Build the string to sign from the timestamp, credential scope, and canonical request hash.
//! 4. Derive the signing key using HMAC-SHA256 from the secret key and credential scope components.
//! 5. Compute the signature and assemble the `Authorization` header.
//!
//! The main entry point is [`sign`]. It is a pure function: the timestamp and
//! credentials are inputs and nothing is cached between calls.

use chrono::{DateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use http::{HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::canonical::{UriEncoding, build_canonical_request, build_signed_headers_string};
use crate::credentials::Credentials;
use crate::error::AuthError;

/// Signature algorithm identifier.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Header carrying the request timestamp.
pub const X_AMZ_DATE: &str = "x-amz-date";

/// Header carrying the hex SHA-256 of the payload.
pub const X_AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";

/// Header carrying the session token of temporary credentials.
pub const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// Headers whose values are always produced by the signer.
pub const SIGNER_OWNED_HEADERS: [&str; 4] = [
    "authorization",
    X_AMZ_DATE,
    X_AMZ_CONTENT_SHA256,
    X_AMZ_SECURITY_TOKEN,
];

type HmacSha256 = Hmac<Sha256>;

/// The parts of an outgoing request that enter the signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    /// HTTP method, e.g. `GET`.
    pub method: &'a str,
    /// The escaped path exactly as it will be sent.
    pub path: &'a str,
    /// The query string exactly as it will be sent (without `?`).
    pub query: &'a str,
    /// Outgoing headers; must contain `host`.
    pub headers: &'a http::HeaderMap,
    /// Hex SHA-256 of the payload that will be sent.
    pub payload_hash: &'a str,
}

/// Scope, credentials and time for one signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    /// Signing region, e.g. `us-east-1`.
    pub region: &'a str,
    /// Signing service name, e.g. `aoss`.
    pub service: &'a str,
    /// Credential snapshot used for this request.
    pub credentials: &'a Credentials,
    /// Request timestamp.
    pub time: DateTime<Utc>,
    /// Canonical URI encoding mode.
    pub uri_encoding: UriEncoding,
}

/// Headers to add to the request, plus the intermediate signing artifacts.
#[derive(Debug, Clone)]
pub struct SigningOutput {
    /// Headers to insert into the outgoing request, replacing existing values.
    pub headers: Vec<(HeaderName, HeaderValue)>,
    /// The canonical request that was hashed.
    pub canonical_request: String,
    /// The string that was signed.
    pub string_to_sign: String,
    /// The hex-encoded signature.
    pub signature: String,
}

/// Sign a request.
///
/// # Errors
///
/// Returns [`AuthError::EmptyScope`] if the region or service is empty,
/// [`AuthError::MissingHeader`] if there is no `host` header, and
/// [`AuthError::InvalidHeaderValue`] if a signed header is not visible ASCII.
pub fn sign(
    request: &SigningRequest<'_>,
    params: &SigningParams<'_>,
) -> Result<SigningOutput, AuthError> {
    if params.region.is_empty() {
        return Err(AuthError::EmptyScope("region"));
    }
    if params.service.is_empty() {
        return Err(AuthError::EmptyScope("service"));
    }

    let amz_date = params.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date = params.time.format("%Y%m%d").to_string();

    let mut header_pairs = collect_signable_headers(request.headers)?;
    if !header_pairs.iter().any(|(name, _)| *name == "host") {
        return Err(AuthError::MissingHeader("host".to_owned()));
    }
    header_pairs.push((X_AMZ_CONTENT_SHA256, request.payload_hash));
    header_pairs.push((X_AMZ_DATE, amz_date.as_str()));
    if let Some(token) = params.credentials.session_token() {
        header_pairs.push((X_AMZ_SECURITY_TOKEN, token));
    }

    let mut signed_headers: Vec<&str> = header_pairs.iter().map(|(name, _)| *name).collect();
    signed_headers.sort_unstable();
    signed_headers.dedup();

    let canonical_request = build_canonical_request(
        request.method,
        request.path,
        request.query,
        &header_pairs,
        &signed_headers,
        request.payload_hash,
        params.uri_encoding,
    );
    let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));

    let credential_scope = format!(
        "{date}/{}/{}/aws4_request",
        params.region, params.service
    );
    let string_to_sign = build_string_to_sign(&amz_date, &credential_scope, &canonical_hash);

    let signing_key = derive_signing_key(
        params.credentials.secret_access_key(),
        &date,
        params.region,
        params.service,
    );
    let signature = compute_signature(&signing_key, &string_to_sign);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={}, Signature={signature}",
        params.credentials.access_key_id(),
        build_signed_headers_string(&signed_headers),
    );

    debug!(
        region = params.region,
        service = params.service,
        signed_headers = %build_signed_headers_string(&signed_headers),
        "Signed request"
    );

    let mut headers = vec![
        (http::header::AUTHORIZATION, header_value("authorization", &authorization)?),
        (HeaderName::from_static(X_AMZ_DATE), header_value(X_AMZ_DATE, &amz_date)?),
        (
            HeaderName::from_static(X_AMZ_CONTENT_SHA256),
            header_value(X_AMZ_CONTENT_SHA256, request.payload_hash)?,
        ),
    ];
    if let Some(token) = params.credentials.session_token() {
        headers.push((
            HeaderName::from_static(X_AMZ_SECURITY_TOKEN),
            header_value(X_AMZ_SECURITY_TOKEN, token)?,
        ));
    }

    Ok(SigningOutput {
        headers,
        canonical_request,
        string_to_sign,
        signature,
    })
}

/// The four-line string to sign: algorithm, `x-amz-date` timestamp,
/// credential scope, and the hex hash of the canonical request.
///
/// # Examples
///
/// ```
/// use sigproxy_auth::sigv4::build_string_to_sign;
///
/// let sts = build_string_to_sign(
///     "20130524T000000Z",
///     "20130524/us-east-1/s3/aws4_request",
///     "7344ae5b7ee6c3e7e6b0fe0640412a37625d1fbfff95c48bbb2dc43964946972",
/// );
/// assert!(sts.starts_with("AWS4-HMAC-SHA256\n20130524T000000Z\n"));
/// ```
#[must_use]
pub fn build_string_to_sign(
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{ALGORITHM}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

/// Signing key for one day, region and service.
///
/// The secret (prefixed with `AWS4`) is folded through HMAC-SHA256 with the
/// date, region, service and the `aws4_request` terminator, in that order.
#[must_use]
pub fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let seed = format!("AWS4{secret_key}").into_bytes();
    [date.as_bytes(), region.as_bytes(), service.as_bytes(), b"aws4_request".as_slice()]
        .into_iter()
        .fold(seed, |key, part| hmac_sha256(&key, part))
}

/// Hex HMAC-SHA256 of the string to sign.
#[must_use]
pub fn compute_signature(signing_key: &[u8], data: &str) -> String {
    hex::encode(hmac_sha256(signing_key, data.as_bytes()))
}

/// Hex SHA-256 of a request body, as sent in `x-amz-content-sha256`.
///
/// # Examples
///
/// ```
/// use sigproxy_auth::sigv4::hash_payload;
///
/// assert_eq!(
///     hash_payload(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Whether a (lowercase) header name takes part in the signature.
#[must_use]
pub fn is_signed_header(name: &str) -> bool {
    name == "host" || name.starts_with("x-amz-")
}

/// Collect `host` and `x-amz-*` headers, skipping the signer-owned ones.
fn collect_signable_headers(headers: &http::HeaderMap) -> Result<Vec<(&str, &str)>, AuthError> {
    let mut pairs = Vec::new();
    for (name, value) in headers {
        let name = name.as_str();
        if !is_signed_header(name) || SIGNER_OWNED_HEADERS.contains(&name) {
            continue;
        }
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidHeaderValue(name.to_owned()))?;
        pairs.push((name, value));
    }
    Ok(pairs)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value).map_err(|_| AuthError::InvalidHeaderValue(name.to_owned()))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
