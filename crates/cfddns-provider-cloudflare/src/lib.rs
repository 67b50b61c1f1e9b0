// # Cloudflare DNS Provider
//
// Implements the three record operations of `cfddns_core::DnsProvider`
// against the Cloudflare API v4:
//
// - Find record ID: GET `/zones/:zone_id/dns_records?type=A&name=...`
// - Fetch record:   GET `/zones/:zone_id/dns_records/:record_id`
// - Update record:  PUT `/zones/:zone_id/dns_records/:record_id`
//
// Every request carries `Authorization: Bearer <token>` and
// `Accept: application/json`, and runs under an explicit timeout.
// The provider is stateless and single-shot: no retries, no caching.
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Construction fails fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/

pub mod schema;

use async_trait::async_trait;
use cfddns_core::traits::DnsProvider;
use cfddns_core::{Error, Result};
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use schema::{ApiEnvelope, DnsRecord, RecordUpdate, UpdateAck};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL written on every update (seconds)
const RECORD_TTL: u32 = 3600;

/// Comment written on every update
const RECORD_COMMENT: &str = "Dynamic DNS update";

const PROVIDER: &str = "cloudflare";

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform the GET requests (record lookup and fetch)
/// - Log the intended PUT payload
/// - **NOT** actually modify DNS records, and report the update as successful
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone the managed records live in
    zone_id: String,

    /// API root, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip PUT updates
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Zone containing the records
    /// - `timeout`: Deadline for each API request
    /// - `dry_run`: If true, perform GET requests but skip PUT updates
    pub fn new(
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
        timeout: Duration,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let zone_id = zone_id.into();
        if zone_id.is_empty() {
            return Err(Error::config("Cloudflare zone ID cannot be empty"));
        }

        // Build HTTP client with timeout
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_id,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a provider in live mode with the default timeout
    pub fn new_live(api_token: impl Into<String>, zone_id: impl Into<String>) -> Result<Self> {
        Self::new(api_token, zone_id, DEFAULT_HTTP_TIMEOUT, false)
    }

    /// Create a provider in dry-run mode with the default timeout
    pub fn new_dry_run(api_token: impl Into<String>, zone_id: impl Into<String>) -> Result<Self> {
        Self::new(api_token, zone_id, DEFAULT_HTTP_TIMEOUT, true)
    }

    /// Point the provider at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether updates are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, self.zone_id)
    }

    fn record_url(&self, record_id: &str) -> String {
        format!("{}/{}", self.records_url(), record_id)
    }

    /// Authenticate, send, and return the body of a successful response
    async fn send(&self, request: reqwest::RequestBuilder, context: &str) -> Result<String> {
        let response = request
            .bearer_auth(&self.api_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: HTTP request failed: {}", context, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(status_error(status, &body, context));
        }

        response
            .text()
            .await
            .map_err(|e| Error::http(format!("{}: failed to read response body: {}", context, e)))
    }
}

/// Map a non-2xx status to an error carrying the status and response body
fn status_error(status: StatusCode, body: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API token or insufficient permissions. Status: {} - {}",
            context, status, body
        )),
        404 => Error::not_found(format!("{}: Status: {} - {}", context, status, body)),
        409 => Error::provider(
            PROVIDER,
            format!(
                "{}: conflict, record is being updated by another process. Status: {} - {}",
                context, status, body
            ),
        ),
        429 => Error::rate_limited(format!(
            "{}: rate limit exceeded. Status: {} - {}",
            context, status, body
        )),
        500..=599 => Error::provider(
            PROVIDER,
            format!(
                "{}: Cloudflare server error (transient): {} - {}",
                context, status, body
            ),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{}: Status: {} - {}", context, status, body),
        ),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// ```http
    /// GET /zones/:zone_id/dns_records?type=A&name=example.com
    /// ```
    async fn find_record_id(&self, domain: &str) -> Result<String> {
        tracing::debug!("Looking up A record ID for {}", domain);

        let request = self
            .client
            .get(self.records_url())
            .query(&[("type", "A"), ("name", domain)]);
        let body = self.send(request, "Error fetching DNS record ID").await?;

        let envelope: ApiEnvelope<Vec<DnsRecord>> = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(Error::provider(
                PROVIDER,
                format!(
                    "Record lookup rejected: {}",
                    schema::describe(&envelope.errors)
                ),
            ));
        }

        let record = envelope
            .result
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("DNS record not found for {}", domain)))?;

        tracing::debug!("Found record ID {} for {}", record.id, domain);
        Ok(record.id)
    }

    /// ```http
    /// GET /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn fetch_record_content(&self, record_id: &str) -> Result<String> {
        let request = self.client.get(self.record_url(record_id));
        let body = self.send(request, "Error fetching DNS record IP").await?;

        let envelope: ApiEnvelope<DnsRecord> = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(Error::provider(
                PROVIDER,
                format!(
                    "Record fetch rejected: {}",
                    schema::describe(&envelope.errors)
                ),
            ));
        }

        tracing::debug!(
            "Record {} ({}) currently points at {}",
            record_id,
            envelope.result.name,
            envelope.result.content
        );
        Ok(envelope.result.content)
    }

    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {"type": "A", "name": ..., "content": ..., "ttl": 3600, "proxied": true, "comment": "Dynamic DNS update"}
    /// ```
    async fn update_record(&self, record_id: &str, new_ip: Ipv4Addr, domain: &str) -> Result<bool> {
        let payload = RecordUpdate {
            record_type: "A",
            name: domain,
            content: new_ip.to_string(),
            ttl: RECORD_TTL,
            proxied: true,
            comment: RECORD_COMMENT,
        };

        let url = self.record_url(record_id);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                serde_json::to_string(&payload)?
            );
            return Ok(true);
        }

        let request = self.client.put(&url).json(&payload);
        let body = self.send(request, "Error updating DNS record").await?;

        let ack: UpdateAck = serde_json::from_str(&body)?;
        if !ack.success {
            tracing::warn!(
                "Cloudflare did not accept the update of {}: {}",
                domain,
                schema::describe(&ack.errors)
            );
        }

        Ok(ack.success)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
