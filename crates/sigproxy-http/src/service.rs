//! Proxy HTTP service implementing the hyper `Service` trait.

use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use sigproxy_core::ProxyError;
use sigproxy_emulator::EmulatedCluster;
use tracing::{Instrument, debug, info_span, warn};

use crate::body::ProxyResponseBody;
use crate::emulate::emulate;
use crate::forwarder::SigningForwarder;
use crate::response::error_to_response;
use crate::router::{Dispatch, RouteTable};

/// Hyper `Service` fronting the route table and the signing forwarder.
///
/// Cloning is cheap: all state is shared behind `Arc`s and never mutated.
#[derive(Debug, Clone)]
pub struct ProxyHttpService {
    routes: Arc<RouteTable>,
    forwarder: Arc<SigningForwarder>,
    cluster: EmulatedCluster,
}

impl ProxyHttpService {
    /// Create a service with the default emulated routes.
    #[must_use]
    pub fn new(forwarder: SigningForwarder) -> Self {
        Self::with_routes(RouteTable::default_routes(), forwarder)
    }

    /// Create a service with a custom route table.
    #[must_use]
    pub fn with_routes(routes: RouteTable, forwarder: SigningForwarder) -> Self {
        Self {
            routes: Arc::new(routes),
            forwarder: Arc::new(forwarder),
            cluster: EmulatedCluster,
        }
    }

    /// Handle one request end to end. Errors are turned into JSON responses.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<ProxyResponseBody>
    where
        B: http_body::Body<Data = Bytes> + Send,
        B::Error: Display,
    {
        match self.process_request(req).await {
            Ok(response) => response,
            Err(err) => {
                warn!(status = err.status_code().as_u16(), error = %err, "request failed");
                error_to_response(&err)
            }
        }
    }

    /// Run a single request through the routing and forwarding pipeline.
    async fn process_request<B>(
        &self,
        req: http::Request<B>,
    ) -> Result<http::Response<ProxyResponseBody>, ProxyError>
    where
        B: http_body::Body<Data = Bytes> + Send,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();

        // 1. Route on method and path only.
        match self.routes.dispatch(&parts.method, parts.uri.path()) {
            Dispatch::Local { route, params } => Ok(emulate(&self.cluster, route, &params)),
            Dispatch::NotFound => Err(ProxyError::NotFound {
                method: parts.method.to_string(),
                path: parts.uri.path().to_owned(),
            }),
            Dispatch::Forward => {
                // 2. Buffer the full body; the signature covers its hash.
                let body = collect_body(body).await?;
                debug!(len = body.len(), "buffered request body");

                // 3. Strip, sign, send, relay.
                self.forwarder.forward(&parts, body).await
            }
        }
    }
}

impl hyper::service::Service<http::Request<Incoming>> for ProxyHttpService {
    type Response = http::Response<ProxyResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %req.method(),
            path = %req.uri().path(),
        );

        Box::pin(async move { Ok(service.handle(req).await) }.instrument(span))
    }
}

/// Collect the incoming body into a single `Bytes` buffer.
async fn collect_body<B>(body: B) -> Result<Bytes, ProxyError>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Display,
{
    body.collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| ProxyError::BodyRead(e.to_string()))
}
