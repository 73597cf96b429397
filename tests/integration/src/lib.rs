//! End-to-end tests for SigProxy.
//!
//! Every test starts a recording upstream and a proxy on ephemeral loopback
//! ports, so nothing external is required:
//!
//! ```text
//! cargo test -p sigproxy-integration
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Once};

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use sigproxy_auth::{Credentials, StaticCredentialProvider};
use sigproxy_core::{ProxyConfig, StripHeaders, TransportConfig, UpstreamScheme};
use sigproxy_http::{ProxyHttpService, SigningForwarder, build_upstream_client, serve};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

static INIT: Once = Once::new();

/// Access key used by every test proxy.
pub const ACCESS_KEY_ID: &str = "AKIDEXAMPLE";
/// Secret key used by every test proxy.
pub const SECRET_ACCESS_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";
/// Session token used by every test proxy.
pub const SESSION_TOKEN: &str = "integration-session-token";
/// Signing region used by [`signing_config`].
pub const REGION: &str = "us-east-1";
/// Signing service used by [`signing_config`].
pub const SERVICE: &str = "es";

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A request as seen by the upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Path exactly as received.
    pub path: String,
    /// Raw query string, if any.
    pub query: Option<String>,
    /// All received headers.
    pub headers: HeaderMap,
    /// Full body.
    pub body: Bytes,
}

impl RecordedRequest {
    /// Value of a header as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Canned answer returned by the upstream.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// Status code.
    pub status: StatusCode,
    /// Extra response headers.
    pub headers: Vec<(&'static str, String)>,
    /// Response body.
    pub body: Bytes,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![("content-type", "application/json".to_owned())],
            body: Bytes::from_static(br#"{"acknowledged":true}"#),
        }
    }
}

#[derive(Debug, Default)]
struct UpstreamState {
    requests: Mutex<Vec<RecordedRequest>>,
    response: Mutex<MockResponse>,
}

impl UpstreamState {
    async fn record(&self, req: http::Request<Incoming>) -> http::Response<Full<Bytes>> {
        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map(http_body_util::Collected::to_bytes)
            .unwrap_or_default();

        self.requests.lock().push(RecordedRequest {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            body,
        });

        let canned = self.response.lock().clone();
        let mut builder = http::Response::builder().status(canned.status);
        for (name, value) in &canned.headers {
            builder = builder.header(*name, value.as_str());
        }
        builder
            .body(Full::new(canned.body))
            .expect("canned response should be valid")
    }
}

/// HTTP/1.1 server that records every request and replies with a canned response.
#[derive(Debug)]
pub struct MockUpstream {
    addr: SocketAddr,
    state: Arc<UpstreamState>,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    /// Start listening on an ephemeral loopback port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind upstream listener");
        let addr = listener.local_addr().expect("upstream local addr");
        let state = Arc::new(UpstreamState::default());

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let svc = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { Ok::<_, Infallible>(state.record(req).await) }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// `host:port` of the upstream.
    #[must_use]
    pub fn authority(&self) -> String {
        self.addr.to_string()
    }

    /// Replace the canned response.
    pub fn respond_with(&self, response: MockResponse) {
        *self.state.response.lock() = response;
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// The only request received; panics if there were zero or several.
    #[must_use]
    pub fn single_request(&self) -> RecordedRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one upstream request");
        requests.into_iter().next().expect("one request")
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A proxy served on an ephemeral loopback port.
#[derive(Debug)]
pub struct TestProxy {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestProxy {
    /// Start a proxy with static test credentials.
    pub async fn start(config: ProxyConfig) -> Self {
        init_tracing();

        let client = build_upstream_client(&TransportConfig::default()).expect("upstream client");
        let forwarder = SigningForwarder::new(
            client,
            Arc::new(config),
            Arc::new(StaticCredentialProvider::new(test_credentials())),
        );
        let service = ProxyHttpService::new(forwarder);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind proxy listener");
        let addr = listener.local_addr().expect("proxy local addr");

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(serve(listener, service, async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            shutdown: Some(tx),
        }
    }

    /// Listen address of the proxy.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Absolute URL of `path_and_query` on the proxy.
    #[must_use]
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{path_and_query}", self.addr)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Credentials every test proxy signs with.
#[must_use]
pub fn test_credentials() -> Credentials {
    Credentials::new(ACCESS_KEY_ID, SECRET_ACCESS_KEY).with_session_token(SESSION_TOKEN)
}

/// Configuration pinning the destination to `upstream` with a fixed scope.
#[must_use]
pub fn signing_config(upstream: &MockUpstream, strip: &[&str]) -> ProxyConfig {
    ProxyConfig::builder()
        .strip_headers(StripHeaders::from_names(strip).expect("valid strip headers"))
        .host_override(Some(upstream.authority()))
        .region_override(Some(REGION.to_owned()))
        .service_override(Some(SERVICE.to_owned()))
        .upstream_scheme(UpstreamScheme::Http)
        .log_failed_requests(true)
        .log_signing(true)
        .build()
}

/// Client talking to the proxy. Redirects are never followed.
#[must_use]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .expect("test client")
}

mod test_emulation;
mod test_errors;
mod test_forwarding;
