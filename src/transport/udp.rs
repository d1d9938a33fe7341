//! UDP transport for DNS queries.
//!
//! Every datagram is an independent query. The receive loop copies the
//! payload and sender address into a fresh task and goes straight back to
//! waiting, so a slow upstream exchange never holds up other clients.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::ProxyError;
use crate::forwarder::DohForwarder;
use crate::stats::Stats;

use super::{MAX_DNS_PACKET_SIZE, Protocol, QueryLogger};

/// UDP transport for the proxy.
///
/// The listening socket is shared between the receive loop and all reply
/// writers. There is no cap on concurrently running query tasks.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Resolve `addr` (`host:port`) and bind a UDP socket to the first result.
    pub async fn bind(addr: &str) -> Result<Self, ProxyError> {
        let resolved = resolve(addr).await.map_err(|source| ProxyError::Resolve {
            addr: addr.to_string(),
            source,
        })?;

        let socket = UdpSocket::bind(resolved)
            .await
            .map_err(|source| ProxyError::Bind {
                addr: resolved.to_string(),
                source,
            })?;

        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start the UDP transport.
    ///
    /// Spawns the receive loop, which in turn spawns one task per datagram.
    pub fn start(
        self,
        forwarder: Arc<DohForwarder>,
        stats: Arc<Stats>,
        verbose: bool,
    ) -> JoinHandle<()> {
        tokio::spawn(run(self.socket, forwarder, stats, verbose))
    }
}

async fn resolve(addr: &str) -> io::Result<SocketAddr> {
    tokio::net::lookup_host(addr).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {addr}"),
        )
    })
}

/// Receive loop. Read errors are logged and never end the loop.
async fn run(
    socket: Arc<UdpSocket>,
    forwarder: Arc<DohForwarder>,
    stats: Arc<Stats>,
    verbose: bool,
) {
    let logger = QueryLogger::new(Protocol::Udp);
    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                warn!("UDP recv error: {}", e);
                stats.record_recv_error();
                continue;
            }
        };

        stats.record_request();

        tokio::spawn(handle_query(
            socket.clone(),
            forwarder.clone(),
            stats.clone(),
            logger,
            verbose,
            buf[..len].to_vec(),
            src,
        ));
    }
}

/// Forward one query and, on success, send the answer back to `client`.
async fn handle_query(
    socket: Arc<UdpSocket>,
    forwarder: Arc<DohForwarder>,
    stats: Arc<Stats>,
    logger: QueryLogger,
    verbose: bool,
    query: Vec<u8>,
    client: SocketAddr,
) {
    let start_time = Instant::now();

    let answer = match forwarder.forward(&query).await {
        Ok(answer) => answer,
        Err(e) => {
            stats.record_failed();
            logger.failed(client, query.len(), &e);
            return;
        }
    };

    let upstream_ms = start_time.elapsed().as_secs_f64() * 1000.0;
    stats.record_forwarded(upstream_ms);

    // Send errors are discarded.
    let _ = socket.send_to(&answer, client).await;

    if verbose {
        logger.forwarded(client, query.len(), answer.len(), upstream_ms);
    }
}
