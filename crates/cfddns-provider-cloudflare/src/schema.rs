//! Typed request and response bodies for the Cloudflare API v4
//!
//! Responses are decoded strictly: a body that does not have the expected
//! shape is reported as [`cfddns_core::Error::Json`] instead of being read
//! as an empty value.

use serde::{Deserialize, Serialize};

/// Standard response envelope
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the API accepted the request
    pub success: bool,

    /// Error messages, empty on success
    #[serde(default)]
    pub errors: Vec<ApiMessage>,

    /// Payload
    pub result: T,
}

/// Acknowledgement returned by record updates
///
/// Only the `success` flag is read; the echoed record is ignored.
#[derive(Debug, Deserialize)]
pub struct UpdateAck {
    pub success: bool,

    #[serde(default)]
    pub errors: Vec<ApiMessage>,
}

/// An entry of an envelope's `errors` array
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: i64,

    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Join error messages for log output
pub fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A DNS record as returned by the list and get endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct DnsRecord {
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub content: String,
}

/// Full-record replacement body for `PUT /zones/:zone_id/dns_records/:id`
#[derive(Debug, Serialize)]
pub struct RecordUpdate<'a> {
    #[serde(rename = "type")]
    pub record_type: &'static str,
    pub name: &'a str,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
    pub comment: &'static str,
}
