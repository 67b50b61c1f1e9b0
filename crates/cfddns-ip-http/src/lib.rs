// # HTTP IP Source
//
// Resolves the host's public IPv4 address by asking an IP-echo service
// (by default https://api.ipify.org) which answers with the caller's
// address as plain text.
//
// One request per call. No retries and no caching: the reconciler decides
// when to ask again.

use async_trait::async_trait;
use cfddns_core::traits::IpSource;
use cfddns_core::{Error, Result};

use std::net::Ipv4Addr;
use std::time::Duration;

/// Default request timeout, same as the configuration default
pub const DEFAULT_TIMEOUT: Duration =
    Duration::from_secs(cfddns_core::config::DEFAULT_REQUEST_TIMEOUT_SECS);

/// HTTP-based IP source
#[derive(Debug, Clone)]
pub struct HttpIpSource {
    /// URL to fetch IP from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source with the default timeout
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create with an explicit per-request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// URL this source queries
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Parse an echo response into a canonical IPv4 address
///
/// Surrounding whitespace is ignored. Anything else that does not
/// round-trip through `Ipv4Addr` unchanged is rejected: IPv6 addresses,
/// octets with leading zeros, embedded text.
pub fn parse_echo_response(body: &str) -> Result<Ipv4Addr> {
    let text = body.trim();

    let ip: Ipv4Addr = text
        .parse()
        .map_err(|_| Error::ip_source(format!("Invalid IP address received: {}", text)))?;

    if ip.to_string() != text {
        return Err(Error::ip_source(format!(
            "Non-canonical IP address received: {}",
            text
        )));
    }

    Ok(ip)
}

#[async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::http(format!(
                "IP echo service returned {}: {}",
                status,
                body.trim()
            )));
        }

        let ip = parse_echo_response(&body)?;
        tracing::debug!("Resolved public IP {} via {}", ip, self.url);
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
