//! Transport layer for the proxy.
//!
//! Receives plaintext DNS queries from local clients and hands them to the
//! DoH forwarder.

pub mod udp;

/// Receive buffer size for a single datagram.
///
/// Datagrams larger than this are truncated before forwarding, which breaks
/// EDNS0 queries advertising bigger payloads.
pub const MAX_DNS_PACKET_SIZE: usize = 512;

use std::net::SocketAddr;

use tracing::{info, warn};

use crate::error::ForwardError;

/// Transport protocol identifier for logging.
#[derive(Debug, Clone, Copy)]
pub enum Protocol {
    Udp,
}

impl Protocol {
    fn as_str(self) -> &'static str {
        match self {
            Protocol::Udp => "UDP",
        }
    }
}

/// Logger for per-query events.
///
/// Failures are always logged; successful forwards only in verbose mode.
#[derive(Debug, Clone, Copy)]
pub struct QueryLogger {
    protocol: Protocol,
}

impl QueryLogger {
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }

    pub fn forwarded(&self, client: SocketAddr, query_len: usize, answer_len: usize, upstream_ms: f64) {
        info!(
            "[{}] {} FORWARDED query={}B answer={}B upstream={:.3}ms",
            self.protocol.as_str(),
            client,
            query_len,
            answer_len,
            upstream_ms
        );
    }

    pub fn failed(&self, client: SocketAddr, query_len: usize, error: &ForwardError) {
        warn!(
            "[{}] {} FAILED query={}B: {}",
            self.protocol.as_str(),
            client,
            query_len,
            error
        );
    }
}
