// # IP Source Trait
//
// Defines the interface for resolving the host's public IPv4 address.
//
// ## Implementations
//
// - HTTP IP-echo service: `cfddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::IpSource;
//
// let source = /* IpSource implementation */;
// let ip = source.current().await?;
// println!("public address: {}", ip);
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for IP source implementations
///
/// An IP source is an observer: it answers "what is the public address right
/// now" with a single lookup and nothing else.
///
/// ## Rules for implementations
/// - One lookup per call, no retries (the [`Reconciler`](crate::Reconciler) owns the cadence)
/// - No caching between calls
/// - Only well-formed, canonical IPv4 addresses are returned
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current public IPv4 address
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: The current address
    /// - `Err(Error)`: Transport failure, non-2xx response or a malformed answer
    async fn current(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Short name used in log lines
    fn source_name(&self) -> &'static str;
}
