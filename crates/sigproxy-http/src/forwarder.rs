//! The signing forwarder: the only component that talks to the real upstream.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::TryStreamExt;
use http::header::{self, HeaderMap, HeaderValue};
use http_body::Frame;
use http_body_util::{BodyExt, StreamBody};
use reqwest::Url;
use sigproxy_auth::CredentialProvider;
use sigproxy_auth::canonical::build_canonical_query_string;
use sigproxy_auth::sigv4::{SigningOutput, SigningParams, SigningRequest, hash_payload, sign};
use sigproxy_core::{ProxyConfig, ProxyError, SigningScope, TransportConfig, resolve_scope};
use tracing::{debug, info, warn};

use crate::body::ProxyResponseBody;

/// Connection-scoped headers that are never relayed in either direction.
///
/// The proxy credentials headers belong here: they are meant for this hop only.
pub const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Build the shared upstream client.
///
/// Redirects are never followed: a 3xx from the upstream is relayed to the
/// client as-is.
pub fn build_upstream_client(transport: &TransportConfig) -> Result<reqwest::Client, ProxyError> {
    if transport.insecure_skip_verify {
        warn!("upstream TLS certificate verification is disabled");
    }

    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_idle_timeout(transport.idle_conn_timeout)
        .danger_accept_invalid_certs(transport.insecure_skip_verify)
        .build()
        .map_err(|e| ProxyError::Config(format!("failed to build upstream client: {e}")))
}

/// Strips, signs and forwards requests, then relays the upstream response.
pub struct SigningForwarder {
    client: reqwest::Client,
    config: Arc<ProxyConfig>,
    credentials: Arc<dyn CredentialProvider>,
}

impl fmt::Debug for SigningForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningForwarder")
            .field("config", &self.config)
            .field("credentials", &"...")
            .finish_non_exhaustive()
    }
}

impl SigningForwarder {
    /// Create a forwarder over a shared client, configuration and credential provider.
    pub fn new(
        client: reqwest::Client,
        config: Arc<ProxyConfig>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            client,
            config,
            credentials,
        }
    }

    /// Forward one request whose body has already been read in full.
    ///
    /// Scope and credential failures are returned before any network call.
    pub async fn forward(
        &self,
        parts: &http::request::Parts,
        body: Bytes,
    ) -> Result<http::Response<ProxyResponseBody>, ProxyError> {
        let mut headers = parts.headers.clone();

        // 1. Strip configured headers before anything else looks at them.
        self.config.strip_headers.apply(&mut headers);

        // 2. Resolve destination and signing scope.
        let original = original_host(parts);
        let scope = resolve_scope(original, &self.config.scope_overrides())?;

        // 3. Rewrite the target, with the query in canonical form.
        let url = target_url(self.config.upstream_scheme.as_str(), &scope, &parts.uri)?;
        let authority = authority(&url)?;
        debug!(
            method = %parts.method,
            path = %url.path(),
            host = %scope.host,
            region = %scope.region,
            service = %scope.service,
            "forwarding request"
        );

        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);
        headers.insert(
            header::HOST,
            HeaderValue::from_str(&authority)
                .map_err(|_| ProxyError::InvalidTarget(authority.clone()))?,
        );

        // 4. Sign with a fresh credential snapshot.
        let credentials = self.credentials.credentials().await?;
        let payload_hash = hash_payload(&body);
        let output = sign(
            &SigningRequest {
                method: parts.method.as_str(),
                path: url.path(),
                query: url.query().unwrap_or(""),
                headers: &headers,
                payload_hash: &payload_hash,
            },
            &SigningParams {
                region: &scope.region,
                service: &scope.service,
                credentials: &credentials,
                time: Utc::now(),
                uri_encoding: scope.uri_encoding(),
            },
        )?;
        self.log_signing(&output);
        for (name, value) in output.headers {
            headers.insert(name, value);
        }

        // 5. Send exactly once.
        let response = self
            .client
            .request(parts.method.clone(), url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(classify_send_error)?;

        // 6. Relay.
        self.relay(response).await
    }

    fn log_signing(&self, output: &SigningOutput) {
        if self.config.should_log_signing() {
            info!(
                canonical_request = %output.canonical_request,
                string_to_sign = %output.string_to_sign,
                "signed upstream request"
            );
        } else {
            debug!(
                canonical_request = %output.canonical_request,
                string_to_sign = %output.string_to_sign,
                "signed upstream request"
            );
        }
    }

    async fn relay(
        &self,
        response: reqwest::Response,
    ) -> Result<http::Response<ProxyResponseBody>, ProxyError> {
        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);
        debug!(status = status.as_u16(), "upstream responded");

        let failed = status.is_client_error() || status.is_server_error();
        let body = if failed && self.config.should_log_failed_requests() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ProxyError::UpstreamBody(e.to_string()))?;
            warn!(
                status = status.as_u16(),
                body = %String::from_utf8_lossy(&bytes),
                "upstream request failed"
            );
            ProxyResponseBody::from_bytes(bytes)
        } else {
            let stream = response
                .bytes_stream()
                .map_ok(Frame::data)
                .map_err(std::io::Error::other);
            ProxyResponseBody::streaming(StreamBody::new(stream).boxed_unsync())
        };

        let mut relayed = http::Response::new(body);
        *relayed.status_mut() = status;
        *relayed.headers_mut() = headers;
        Ok(relayed)
    }
}

/// Host the client addressed: the `Host` header, else the request URI authority.
fn original_host(parts: &http::request::Parts) -> Option<&str> {
    parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.authority().map(http::uri::Authority::as_str))
}

/// Upstream URL for the request, with the query rewritten to its canonical form.
///
/// The path must survive URL parsing unchanged. Paths the parser would rewrite
/// (dot segments, including `%2e%2e`) are rejected instead of being forwarded
/// somewhere other than where they were routed.
fn target_url(scheme: &str, scope: &SigningScope, uri: &http::Uri) -> Result<Url, ProxyError> {
    let mut url = Url::parse(&format!("{scheme}://{}{}", scope.host, uri.path()))
        .map_err(|e| ProxyError::InvalidTarget(format!("{}: {e}", scope.host)))?;
    if url.path() != uri.path() {
        return Err(ProxyError::InvalidTarget(format!(
            "path {} would be sent as {}",
            uri.path(),
            url.path()
        )));
    }
    let query = build_canonical_query_string(uri.query().unwrap_or(""));
    url.set_query((!query.is_empty()).then_some(query.as_str()));
    Ok(url)
}

/// `host[:port]` as it appears in the outgoing `Host` header.
fn authority(url: &Url) -> Result<String, ProxyError> {
    let host = url
        .host_str()
        .ok_or_else(|| ProxyError::InvalidTarget(url.to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
    for name in &listed {
        headers.remove(name.as_str());
    }
}

fn classify_send_error(error: reqwest::Error) -> ProxyError {
    if error.is_timeout() {
        ProxyError::UpstreamTimeout(error.to_string())
    } else {
        ProxyError::UpstreamConnect(error.to_string())
    }
}
