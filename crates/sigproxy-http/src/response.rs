//! JSON response formatting for emulated routes and locally produced errors.

use http::StatusCode;
use serde::Serialize;
use sigproxy_core::ProxyError;
use tracing::error;

use crate::body::ProxyResponseBody;

/// Content type of every JSON document produced by the proxy itself.
pub const CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Serialize `value` into a JSON response.
///
/// A serialization failure is logged and whatever was written so far is
/// sent with the requested status.
#[must_use]
pub fn json_response<T: Serialize>(
    status: StatusCode,
    value: &T,
) -> http::Response<ProxyResponseBody> {
    let mut buf = Vec::with_capacity(256);
    if let Err(e) = serde_json::to_writer(&mut buf, value) {
        error!(error = %e, written = buf.len(), "failed to serialize emulated response");
    }

    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, CONTENT_TYPE)
        .body(ProxyResponseBody::from_bytes(buf))
        .expect("valid JSON response")
}

/// Build the JSON error body for a proxy error.
///
/// ```json
/// {
///   "error": { "type": "upstream_exception", "reason": "..." },
///   "status": 502
/// }
/// ```
#[must_use]
pub fn error_to_json(error: &ProxyError) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "type": error.error_type(),
            "reason": error.to_string(),
        },
        "status": error.status_code().as_u16(),
    })
}

/// Convert a `ProxyError` into a complete HTTP error response.
#[must_use]
pub fn error_to_response(error: &ProxyError) -> http::Response<ProxyResponseBody> {
    json_response(error.status_code(), &error_to_json(error))
}
