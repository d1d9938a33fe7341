//! DNS-over-HTTPS forwarding.
//!
//! Turns a raw DNS query into a raw DNS answer with a single RFC 8484 GET
//! exchange against a fixed upstream endpoint:
//!
//! ```text
//! GET /dns-query?dns=<base64url(query), no padding> HTTP/2
//! Accept: application/dns-message
//! ```
//!
//! Queries and answers are opaque bytes here. Nothing is parsed or validated.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use tracing::debug;

use crate::error::{ForwardError, ProxyError};

/// Media type of a binary DNS message (RFC 8484 §6).
pub const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// Default upstream resolver.
pub const DEFAULT_ENDPOINT: &str = "https://cloudflare-dns.com/dns-query";

/// Query parameter carrying the encoded DNS message.
const DNS_QUERY_PARAM: &str = "dns";

/// Forwards raw DNS queries to a DoH endpoint.
///
/// Holds no per-exchange state, so a single instance is shared by every
/// in-flight query. The inner client keeps reqwest's default connection
/// handling; no pooling policy is configured on top of it.
pub struct DohForwarder {
    client: Client,
    endpoint: Url,
    timeout: Option<Duration>,
}

impl DohForwarder {
    /// Create a forwarder for `endpoint`.
    ///
    /// TLS certificates are always validated. `timeout` bounds a whole
    /// exchange (request and body); with `None` a stalled upstream keeps the
    /// caller waiting indefinitely.
    pub fn new(endpoint: Url, timeout: Option<Duration>) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(ProxyError::Client)?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Build the GET URL for `query`: the endpoint with `dns=<encoded>` appended.
    ///
    /// An empty query still produces a well-formed URL with an empty `dns` value.
    pub fn request_url(&self, query: &[u8]) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(DNS_QUERY_PARAM, &encode_query(query));
        url
    }

    /// Send `query` upstream and return the response body.
    ///
    /// The body is returned verbatim regardless of HTTP status, so an error
    /// page from the upstream is relayed as if it were a DNS answer. Failures
    /// are not retried.
    pub async fn forward(&self, query: &[u8]) -> Result<Vec<u8>, ForwardError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange(query))
                .await
                .map_err(|_| ForwardError::Timeout(limit))?,
            None => self.exchange(query).await,
        }
    }

    async fn exchange(&self, query: &[u8]) -> Result<Vec<u8>, ForwardError> {
        let url = self.request_url(query);

        debug!(url = %self.endpoint, query_len = query.len(), "Sending DoH query");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, DNS_MESSAGE_CONTENT_TYPE)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(url = %self.endpoint, status = status.as_u16(), "Relaying non-success DoH response");
        }

        let body = response.bytes().await?;

        debug!(url = %self.endpoint, response_len = body.len(), "DoH response received");

        Ok(body.to_vec())
    }
}

/// Encode a DNS message for the `dns` parameter: base64url without padding.
pub fn encode_query(query: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(query)
}
