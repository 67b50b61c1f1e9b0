// # DNS Provider Trait
//
// Defines the three record operations the reconciliation loop needs.
//
// ## Implementations
//
// - Cloudflare: `cfddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::DnsProvider;
//
// let provider = /* DnsProvider implementation */;
//
// let id = provider.find_record_id("home.example.com").await?;
// let content = provider.fetch_record_content(&id).await?;
// if content != "203.0.113.5" {
//     let ok = provider
//         .update_record(&id, "203.0.113.5".parse()?, "home.example.com")
//         .await?;
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for DNS provider implementations
///
/// Each method is a single API call against the provider. Implementations
/// must not retry, sleep, cache or decide whether an update is needed;
/// the [`Reconciler`](crate::Reconciler) owns all of that.
///
/// Every failure (transport, non-2xx status, unexpected response shape) is
/// returned as an error. The caller logs it and moves on.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Find the identifier of the first A record named exactly `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The record ID
    /// - `Err(Error::NotFound)`: No A record with that name exists
    /// - `Err(Error)`: The request failed
    async fn find_record_id(&self, domain: &str) -> Result<String, crate::Error>;

    /// Fetch the current address (`content`) of a record
    async fn fetch_record_content(&self, record_id: &str) -> Result<String, crate::Error>;

    /// Overwrite a record with a new address
    ///
    /// The whole record is replaced: type A, `domain` as the name, `new_ip`
    /// as the content, plus the provider's fixed TTL, proxy and comment
    /// settings.
    ///
    /// # Returns
    ///
    /// - `Ok(bool)`: The provider's acknowledgement (`success` flag)
    /// - `Err(Error)`: The request failed or was rejected
    async fn update_record(
        &self,
        record_id: &str,
        new_ip: Ipv4Addr,
        domain: &str,
    ) -> Result<bool, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
