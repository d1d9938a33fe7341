use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use doh_proxy::forwarder::DEFAULT_ENDPOINT;
use doh_proxy::proxy::{self, ProxyConfig};

#[derive(Parser)]
#[command(name = "doh-proxy")]
#[command(about = "Forward UDP DNS queries to a DNS-over-HTTPS resolver", long_about = None)]
struct Args {
    /// Local port to listen on
    #[arg(short, long, default_value = "53530")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Upstream DoH endpoint
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    upstream: Url,

    /// Upstream request timeout in seconds (no timeout when unset)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Log every forwarded query
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = ProxyConfig {
        listen_addr: listen_addr(&args.bind, args.port),
        endpoint: args.upstream,
        timeout: args.timeout.map(Duration::from_secs),
        verbose: args.verbose,
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(proxy::run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Join host and port, bracketing bare IPv6 literals.
fn listen_addr(bind: &str, port: u16) -> String {
    if bind.contains(':') && !bind.starts_with('[') {
        format!("[{}]:{}", bind, port)
    } else {
        format!("{}:{}", bind, port)
    }
}
