//! Core types, configuration, and signing-scope resolution for SigProxy.
//!
//! This crate holds everything the HTTP layer needs to decide *how* a request
//! is signed without touching the network: the immutable process
//! configuration, the header-strip set, and the rules that turn a destination
//! host into a SigV4 region and service name.

pub mod config;
pub mod error;
pub mod scope;

pub use config::{ProxyConfig, StripHeaders, TransportConfig, UpstreamScheme};
pub use error::{ProxyError, ProxyResult};
pub use scope::{ScopeOverrides, SigningScope, infer_scope, resolve_scope};
