//! DNS-over-HTTPS proxy orchestration.
//!
//! Binds the UDP transport, builds the forwarder and runs the proxy.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::ProxyError;
use crate::forwarder::DohForwarder;
use crate::stats::Stats;
use crate::transport::udp::UdpTransport;

const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the proxy. Built once at startup and never changed.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Local address to listen on (`host:port`, resolved at bind time)
    pub listen_addr: String,
    /// DoH endpoint every query is sent to
    pub endpoint: Url,
    /// Upper bound on a single upstream exchange, none by default
    pub timeout: Option<Duration>,
    /// Log every forwarded query
    pub verbose: bool,
}

/// A bound proxy that has not started serving yet.
pub struct Proxy {
    udp: UdpTransport,
    forwarder: Arc<DohForwarder>,
    stats: Arc<Stats>,
    verbose: bool,
}

impl Proxy {
    /// Build the forwarder and bind the listening socket.
    ///
    /// Fails if the listen address cannot be resolved or bound.
    pub async fn bind(config: ProxyConfig) -> Result<Self, ProxyError> {
        let forwarder = Arc::new(DohForwarder::new(config.endpoint, config.timeout)?);
        let udp = UdpTransport::bind(&config.listen_addr).await?;

        Ok(Self {
            udp,
            forwarder,
            stats: Arc::new(Stats::new()),
            verbose: config.verbose,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.udp.local_addr()
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }

    /// Start the receive loop in the background and return its handle.
    pub fn start(self) -> JoinHandle<()> {
        self.udp.start(self.forwarder, self.stats, self.verbose)
    }
}

/// Run the proxy with the given configuration.
///
/// Returns only on a startup failure; otherwise serves until the process is
/// terminated.
pub async fn run(config: ProxyConfig) -> Result<(), ProxyError> {
    let proxy = Proxy::bind(config).await?;

    let listen = proxy
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    info!("DoH proxy listening on {} (UDP)", listen);
    info!("Forwarding to upstream: {}", proxy.forwarder.endpoint());
    match proxy.forwarder.timeout() {
        Some(t) => info!("Upstream timeout: {:?}", t),
        None => info!("Upstream timeout: none"),
    }

    let stats = proxy.stats();
    let server = proxy.start();

    // Print stats every minute
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            let stats = stats.snapshot_and_reset();
            info!(
                "[stats] uptime={}s requests={} forwarded={} failed={} recv_errors={} avg_upstream={:.2}ms",
                stats.uptime_secs,
                stats.requests,
                stats.forwarded,
                stats.failed,
                stats.recv_errors,
                stats.avg_upstream_ms
            );
        }
    });

    // The receive loop never exits on its own
    let _ = server.await;

    Ok(())
}
