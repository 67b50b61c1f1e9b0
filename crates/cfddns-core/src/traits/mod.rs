//! Core traits for cfddns
//!
//! - [`IpSource`]: Resolve the current public IPv4 address
//! - [`DnsProvider`]: Find, read and overwrite A records via a provider API

pub mod ip_source;
pub mod dns_provider;

pub use ip_source::IpSource;
pub use dns_provider::DnsProvider;
