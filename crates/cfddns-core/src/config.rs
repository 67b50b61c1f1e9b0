//! Configuration for cfddns
//!
//! The agent reads a JSON file describing the Cloudflare zone, the API
//! token, the domains to keep in sync and the polling cadence. Keys follow
//! the PascalCase layout of the published `config.example.json`; camelCase
//! and snake_case spellings are accepted as aliases.
//!
//! ```json
//! {
//!   "ZoneId": "<32 hex characters>",
//!   "ApiToken": "<40 hex characters>",
//!   "Domains": ["home.example.com"],
//!   "FrequencyToCheckInMinutes": 120
//! }
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Config file used when no `-config` flag is given
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Environment variable that overrides the configured API token
pub const CREDENTIAL_ENV_VAR: &str = "CF_API_TOKEN";

/// Zone ID shipped in `config.example.json`
pub const PLACEHOLDER_ZONE_ID: &str = "0123456789abcdef0123456789abcdef";

/// API token shipped in `config.example.json`
pub const PLACEHOLDER_API_TOKEN: &str = "0123456789abcdef0123456789abcdef01234567";

/// Public IP-echo endpoint returning the caller's address as plain text
pub const DEFAULT_IP_ECHO_URL: &str = "https://api.ipify.org";

const ZONE_ID_LEN: usize = 32;
const API_TOKEN_LEN: usize = 40;

const DEFAULT_POLL_INTERVAL_MINUTES: u64 = 120;
const DEFAULT_RETRY_DELAY_SECS: u64 = 60;
/// Default `RequestTimeoutSeconds`
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Validated agent configuration
///
/// Immutable after [`Configuration::load`], except for the API token which
/// may be replaced by [`Configuration::apply_credential_override`].
#[derive(Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Cloudflare zone identifier (32 hex characters)
    pub zone_id: String,

    /// Cloudflare API token used as a bearer credential
    /// ⚠️ NEVER log this value
    pub api_token: String,

    /// Record names to keep in sync, processed in order
    pub domains: Vec<String>,

    /// Minutes between reconciliation cycles
    pub poll_interval_minutes: u64,

    /// Seconds to back off after the public IP could not be resolved
    pub retry_delay_secs: u64,

    /// Deadline applied to every outbound HTTP request
    pub request_timeout_secs: u64,

    /// Endpoint queried for the public IPv4 address
    pub ip_echo_url: String,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("zone_id", &self.zone_id)
            .field("api_token", &"<REDACTED>")
            .field("domains", &self.domains)
            .field("poll_interval_minutes", &self.poll_interval_minutes)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("ip_echo_url", &self.ip_echo_url)
            .finish()
    }
}

/// On-disk shape; every field is optional so that validation can report
/// all problems at once instead of failing on the first missing key.
#[derive(Debug, Deserialize)]
struct RawConfiguration {
    #[serde(rename = "ZoneId", alias = "zoneId", alias = "zone_id")]
    zone_id: Option<String>,

    #[serde(rename = "ApiToken", alias = "apiToken", alias = "api_token")]
    api_token: Option<String>,

    #[serde(rename = "Domains", alias = "domains")]
    domains: Option<Vec<String>>,

    #[serde(
        rename = "FrequencyToCheckInMinutes",
        alias = "frequencyToCheckInMinutes",
        alias = "poll_interval_minutes"
    )]
    frequency_to_check_in_minutes: Option<i64>,

    #[serde(rename = "RetryDelaySeconds", alias = "retryDelaySeconds", alias = "retry_delay_secs")]
    retry_delay_seconds: Option<i64>,

    #[serde(
        rename = "RequestTimeoutSeconds",
        alias = "requestTimeoutSeconds",
        alias = "request_timeout_secs"
    )]
    request_timeout_seconds: Option<i64>,

    #[serde(rename = "IpEchoUrl", alias = "ipEchoUrl", alias = "ip_echo_url")]
    ip_echo_url: Option<String>,
}

impl RawConfiguration {
    fn into_configuration(self) -> Configuration {
        Configuration {
            zone_id: self.zone_id.unwrap_or_default().trim().to_string(),
            api_token: self.api_token.unwrap_or_default().trim().to_string(),
            domains: self.domains.unwrap_or_default(),
            poll_interval_minutes: positive_or(
                self.frequency_to_check_in_minutes,
                DEFAULT_POLL_INTERVAL_MINUTES,
            ),
            retry_delay_secs: positive_or(self.retry_delay_seconds, DEFAULT_RETRY_DELAY_SECS),
            request_timeout_secs: positive_or(
                self.request_timeout_seconds,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            ip_echo_url: self
                .ip_echo_url
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_IP_ECHO_URL.to_string()),
        }
    }
}

/// Absent, zero and negative values all fall back to the default
fn positive_or(value: Option<i64>, default: u64) -> u64 {
    match value {
        Some(v) if v > 0 => v as u64,
        _ => default,
    }
}

fn is_hex_of_len(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_hexdigit())
}

impl Configuration {
    /// Load and validate the configuration file at `path`
    ///
    /// # Errors
    ///
    /// - [`Error::ConfigMissing`] if the file does not exist
    /// - [`Error::ConfigParse`] if it is not valid JSON of the expected shape
    /// - [`Error::ConfigInvalid`] listing every violated rule
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigMissing(path.to_path_buf()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        Self::from_json(&text, path)
    }

    /// Parse, apply defaults and validate a JSON document
    ///
    /// `origin` is only used in error messages.
    pub fn from_json(text: &str, origin: &Path) -> Result<Self> {
        let raw: RawConfiguration =
            serde_json::from_str(text).map_err(|e| Error::ConfigParse {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

        let config = raw.into_configuration();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Every rule is checked; the returned [`Error::ConfigInvalid`] carries
    /// one human-readable reason per violation.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.zone_id.is_empty() {
            problems.push("ZoneId is missing in configuration.".to_string());
        } else if !is_hex_of_len(&self.zone_id, ZONE_ID_LEN) {
            problems.push(format!(
                "ZoneId must be exactly {} hexadecimal characters (got {} characters).",
                ZONE_ID_LEN,
                self.zone_id.len()
            ));
        } else if self.zone_id.eq_ignore_ascii_case(PLACEHOLDER_ZONE_ID) {
            problems.push(
                "ZoneId is still the example placeholder. Use the zone ID from your Cloudflare dashboard."
                    .to_string(),
            );
        }

        if self.api_token.is_empty() {
            problems.push("ApiToken is missing in configuration.".to_string());
        } else if !is_hex_of_len(&self.api_token, API_TOKEN_LEN) {
            // Never echo the token itself
            problems.push(format!(
                "ApiToken must be exactly {} hexadecimal characters (got {} characters).",
                API_TOKEN_LEN,
                self.api_token.len()
            ));
        } else if self.api_token.eq_ignore_ascii_case(PLACEHOLDER_API_TOKEN) {
            problems.push(
                "ApiToken is still the example placeholder. Create an API token with DNS edit permission."
                    .to_string(),
            );
        }

        if self.domains.is_empty() {
            problems.push("Domains list is missing or empty in configuration.".to_string());
        }

        if !self.ip_echo_url.starts_with("https://") && !self.ip_echo_url.starts_with("http://") {
            problems.push(format!(
                "IpEchoUrl must use the http or https scheme. Got: {}",
                self.ip_echo_url
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigInvalid(problems))
        }
    }

    /// Replace the API token with an externally supplied one
    ///
    /// Applied after validation; the replacement is not re-validated.
    /// Empty values are ignored. Returns `true` if the token was replaced.
    pub fn apply_credential_override(&mut self, value: Option<String>) -> bool {
        match value {
            Some(token) if !token.is_empty() => {
                self.api_token = token;
                true
            }
            _ => false,
        }
    }

    /// Interval between reconciliation cycles
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes.saturating_mul(60))
    }

    /// Backoff after a failed IP resolution, never longer than the poll interval
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs).min(self.poll_interval())
    }

    /// Per-request deadline for outbound HTTP calls
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
