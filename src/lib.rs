//! doh-proxy - forwards plaintext UDP DNS queries to a DNS-over-HTTPS resolver.
//!
//! This library exposes the forwarder and transport for benchmarking and testing.

pub mod error;
pub mod forwarder;
pub mod proxy;
pub mod stats;
pub mod transport;
