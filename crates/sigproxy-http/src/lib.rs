//! HTTP layer of SigProxy.
//!
//! This crate turns inbound HTTP requests into either a locally emulated
//! control-plane answer or a signed upstream request:
//!
//! - **Router**: ordered, first-match-wins `(method, path)` rules
//! - **Emulator bridge**: serializes the fixed cluster documents
//! - **Forwarder**: strips headers, resolves scope, signs and relays
//! - **Service**: hyper `Service` tying the above together
//! - **Server**: accept loop with graceful shutdown

pub mod body;
pub mod emulate;
pub mod forwarder;
pub mod response;
pub mod router;
pub mod server;
pub mod service;

pub use body::ProxyResponseBody;
pub use forwarder::{SigningForwarder, build_upstream_client};
pub use router::{Dispatch, LocalRoute, RouteTable};
pub use server::serve;
pub use service::ProxyHttpService;
