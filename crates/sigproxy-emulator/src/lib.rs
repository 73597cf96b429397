//! Control-plane emulation for SigProxy.
//!
//! Search clients query cluster metadata (`GET /`, node and index stats,
//! health) before sending real traffic. Serverless collections do not answer
//! these calls, so the proxy answers them locally from the fixed payloads in
//! this crate, describing a single permanently healthy node.

pub mod cluster;
pub mod model;

pub use cluster::EmulatedCluster;
