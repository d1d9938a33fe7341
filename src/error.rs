//! Error types for the proxy.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Startup failures. The proxy cannot serve anything without a bound socket
/// and an HTTP client, so all of these are fatal.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("failed to resolve listen address {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to build DoH client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Failure of a single DoH exchange.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("DoH request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("DoH request timed out after {0:?}")]
    Timeout(Duration),
}
