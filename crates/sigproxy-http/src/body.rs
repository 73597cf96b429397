//! Response body type shared by emulated and forwarded responses.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;
use http_body_util::combinators::UnsyncBoxBody;

/// Response body returned to the client.
///
/// Emulated and error responses are buffered JSON. Forwarded responses are
/// relayed as a stream, unless the body had to be captured for logging.
#[derive(Debug, Default)]
pub enum ProxyResponseBody {
    /// A fully buffered body.
    Buffered(Full<Bytes>),
    /// An upstream body relayed chunk by chunk.
    Streaming(UnsyncBoxBody<Bytes, std::io::Error>),
    /// No body.
    #[default]
    Empty,
}

impl ProxyResponseBody {
    /// Create a response body from raw bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// Create an empty response body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Wrap a streaming body.
    #[must_use]
    pub fn streaming(body: UnsyncBoxBody<Bytes, std::io::Error>) -> Self {
        Self::Streaming(body)
    }
}

impl http_body::Body for ProxyResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Streaming(stream) => Pin::new(stream).poll_frame(cx),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Streaming(stream) => stream.is_end_stream(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Streaming(stream) => stream.size_hint(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}
