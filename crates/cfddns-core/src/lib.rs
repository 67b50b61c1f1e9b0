// # cfddns-core
//
// Core library for the cfddns agent, which keeps Cloudflare A records in
// sync with the host's public IPv4 address.
//
// ## Architecture Overview
//
// - **Configuration**: JSON config loading, defaults and validation
// - **IpSource**: Trait for resolving the current public IPv4 address
// - **DnsProvider**: Trait for the three record operations (find, fetch, update)
// - **Reconciler**: The polling loop that compares and updates records
//
// Concrete implementations live in sibling crates:
// `cfddns-ip-http` and `cfddns-provider-cloudflare`.

pub mod traits;
pub mod engine;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{IpSource, DnsProvider};
pub use engine::{Reconciler, ReconciliationState, EngineEvent, CycleOutcome, CycleSummary};
pub use config::{Configuration, CREDENTIAL_ENV_VAR, DEFAULT_CONFIG_PATH};
pub use error::{Error, Result};
