//! Mock DoH upstream and DNS message builders shared by the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use doh_proxy::proxy::{Proxy, ProxyConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// What the mock upstream does with a decoded query.
pub enum Reply {
    /// Respond with this status and body.
    Answer { status: u16, body: Vec<u8> },
    /// Respond after a delay.
    Delayed(Duration, Vec<u8>),
    /// Close the connection without responding.
    Drop,
}

/// A request seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub dns_param: Option<String>,
    pub accept: Option<String>,
}

/// Plain HTTP/1.1 server speaking just enough DoH GET for the proxy.
pub struct MockDohServer {
    pub addr: SocketAddr,
    pub seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockDohServer {
    /// Start a mock upstream; `handler` maps each decoded query to a reply.
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&[u8]) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);

        let seen_clone = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    continue;
                };
                let handler = handler.clone();
                let seen = seen_clone.clone();
                tokio::spawn(async move {
                    serve_connection(stream, handler, seen).await;
                });
            }
        });

        Self { addr, seen }
    }

    /// Start a mock upstream that answers every query with `body`.
    pub async fn canned(body: Vec<u8>) -> Self {
        Self::start(move |_| Reply::Answer {
            status: 200,
            body: body.clone(),
        })
        .await
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/dns-query", self.addr)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

async fn serve_connection<F>(
    mut stream: TcpStream,
    handler: Arc<F>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
) where
    F: Fn(&[u8]) -> Reply + Send + Sync + 'static,
{
    let Some(head) = read_request_head(&mut stream).await else {
        return;
    };
    let request = parse_request(&head);

    let query = request
        .dns_param
        .as_deref()
        .map(|p| URL_SAFE_NO_PAD.decode(p).unwrap_or_default())
        .unwrap_or_default();
    seen.lock().unwrap().push(request);

    let (status, body) = match handler(&query) {
        Reply::Answer { status, body } => (status, body),
        Reply::Delayed(delay, body) => {
            tokio::time::sleep(delay).await;
            (200, body)
        }
        Reply::Drop => return,
    };

    let head = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/dns-message\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(&body).await;
    let _ = stream.shutdown().await;
}

async fn read_request_head(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            return String::from_utf8(buf).ok();
        }
    }
}

fn parse_request(head: &str) -> SeenRequest {
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default();

    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let dns_param = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("dns="))
        .map(str::to_string);

    let accept = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("accept"))
        .map(|(_, value)| value.trim().to_string());

    SeenRequest {
        method,
        path: path.to_string(),
        dns_param,
        accept,
    }
}

/// Bind a proxy on an ephemeral localhost port and start serving.
pub async fn start_proxy(endpoint: &str, timeout: Option<Duration>) -> (Proxy, SocketAddr) {
    let config = ProxyConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        endpoint: endpoint.parse().unwrap(),
        timeout,
        verbose: true,
    };
    let proxy = Proxy::bind(config).await.unwrap();
    let addr = proxy.local_addr().unwrap();
    (proxy, addr)
}

/// Send `query` to the proxy and wait up to `wait` for a reply.
pub async fn exchange(proxy: SocketAddr, query: &[u8], wait: Duration) -> Option<(Vec<u8>, SocketAddr)> {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(query, proxy).await.unwrap();

    let mut buf = [0u8; 4096];
    match tokio::time::timeout(wait, client.recv_from(&mut buf)).await {
        Ok(Ok((len, from))) => Some((buf[..len].to_vec(), from)),
        _ => None,
    }
}

/// Minimal A query for `example.com`.
pub fn build_dns_query(id: u16) -> Vec<u8> {
    let mut query = Vec::new();
    query.extend_from_slice(&id.to_be_bytes()); // Query ID
    query.extend_from_slice(&[0x01, 0x00]); // Flags: standard query
    query.extend_from_slice(&[0x00, 0x01]); // Questions: 1
    query.extend_from_slice(&[0x00, 0x00]); // Answer RRs: 0
    query.extend_from_slice(&[0x00, 0x00]); // Authority RRs: 0
    query.extend_from_slice(&[0x00, 0x00]); // Additional RRs: 0
    query.extend_from_slice(&[0x07]); // length of "example"
    query.extend_from_slice(b"example");
    query.extend_from_slice(&[0x03]); // length of "com"
    query.extend_from_slice(b"com");
    query.extend_from_slice(&[0x00]); // null terminator
    query.extend_from_slice(&[0x00, 0x01]); // Type: A
    query.extend_from_slice(&[0x00, 0x01]); // Class: IN
    query
}

/// Answer to [`build_dns_query`]: example.com A 93.184.216.34.
pub fn build_dns_response(id: u16) -> Vec<u8> {
    let mut response = build_dns_query(id);
    response[2] = 0x81; // Response flag
    response[3] = 0x80; // Recursion available
    response[6] = 0x00; // Answer count
    response[7] = 0x01;
    response.extend_from_slice(&[0xc0, 0x0c]); // Name pointer
    response.extend_from_slice(&[0x00, 0x01]); // Type: A
    response.extend_from_slice(&[0x00, 0x01]); // Class: IN
    response.extend_from_slice(&[0x00, 0x00, 0x01, 0x2c]); // TTL: 300
    response.extend_from_slice(&[0x00, 0x04]); // Data length: 4
    response.extend_from_slice(&[93, 184, 216, 34]); // IP address
    response
}
