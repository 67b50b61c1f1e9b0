//! Reconciliation engine
//!
//! The [`Reconciler`] is responsible for:
//! - Resolving the public IPv4 address via [`IpSource`]
//! - Skipping provider calls while that address is unchanged
//! - Comparing every configured record against the new address
//! - Overwriting records that differ via [`DnsProvider`]
//!
//! ## Cycle
//!
//! ```text
//!   ┌──────────┐   none    ┌────────────────────┐
//!   │ resolve  │──────────▶│ wait retry delay   │──┐
//!   └──────────┘           └────────────────────┘  │
//!        │ ip                                      │
//!        ▼                                         │
//!   same as last? ── yes ──▶ wait poll interval ───┤
//!        │ no                        ▲             │
//!        ▼                           │             │
//!   for each domain:                 │             │
//!     find id ─▶ fetch content ─▶ compare ─▶ update│
//!        └───────────────────────────┘             │
//!        ▲                                         │
//!        └─────────────────────────────────────────┘
//! ```
//!
//! The first cycle starts immediately. A failure on one domain never
//! affects the others, and no error inside a cycle stops the loop.

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, IpSource};
use std::future::Future;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

/// Capacity of the engine event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The public IP could not be resolved this cycle
    IpUnavailable { error: String },

    /// The public IP equals the last observed one; no provider calls made
    IpUnchanged { ip: Ipv4Addr },

    /// A new public IP was observed
    IpChanged {
        previous_ip: Option<Ipv4Addr>,
        new_ip: Ipv4Addr,
    },

    /// The record ID for a domain could not be found
    RecordLookupFailed { domain: String, error: String },

    /// The record's current content could not be fetched
    RecordFetchFailed {
        domain: String,
        record_id: String,
        error: String,
    },

    /// The record already points at the public IP
    RecordMatches { domain: String, ip: Ipv4Addr },

    /// An update was sent and acknowledged with `success`
    RecordUpdated {
        domain: String,
        record_id: String,
        previous_content: String,
        new_ip: Ipv4Addr,
        success: bool,
    },

    /// The update request itself failed
    RecordUpdateFailed {
        domain: String,
        record_id: String,
        error: String,
    },

    /// Engine stopped
    Stopped { reason: String },
}

/// In-memory state carried between cycles
///
/// Never persisted: a restart begins with no observed IP.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationState {
    /// Last public IP successfully resolved
    pub last_observed_ip: Option<Ipv4Addr>,
}

/// Per-domain tallies for one reconciliation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Updates acknowledged with `success: true`
    pub updated: usize,
    /// Updates that failed or were acknowledged with `success: false`
    pub failed: usize,
    /// Records that already held the public IP
    pub matched: usize,
    /// Domains skipped because lookup or fetch failed
    pub skipped: usize,
}

/// Result of a single reconciliation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The public IP could not be resolved
    IpUnavailable,
    /// The public IP did not change since the previous cycle
    Unchanged(Ipv4Addr),
    /// A new IP was observed and every domain was checked
    Reconciled {
        ip: Ipv4Addr,
        summary: CycleSummary,
    },
}

enum DomainOutcome {
    Skipped,
    Matched,
    Updated(bool),
    UpdateFailed,
}

/// The reconciliation loop
///
/// Owns its collaborators and its [`ReconciliationState`]; nothing is global.
/// All work is sequential on the calling task.
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Start with [`Reconciler::run()`] or [`Reconciler::run_until()`]
/// 3. The loop runs until the shutdown future completes
pub struct Reconciler {
    /// Public IP resolver
    ip_source: Box<dyn IpSource>,

    /// DNS record client
    provider: Box<dyn DnsProvider>,

    /// Domains to reconcile, in order
    domains: Vec<String>,

    /// Delay between cycles once an IP has been resolved
    poll_interval: Duration,

    /// Delay after a failed IP resolution
    retry_delay: Duration,

    /// Last observed IP
    state: ReconciliationState,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields engine events
    pub fn new(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        config: &Configuration,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        if config.domains.is_empty() {
            return Err(Error::config("No domains configured"));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let engine = Self {
            ip_source,
            provider,
            domains: config.domains.clone(),
            poll_interval: config.poll_interval(),
            retry_delay: config.retry_delay(),
            state: ReconciliationState::default(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Current reconciliation state
    pub fn state(&self) -> &ReconciliationState {
        &self.state
    }

    /// Run cycles until `shutdown` completes
    ///
    /// The first cycle starts immediately. Afterwards the loop sleeps for
    /// the poll interval, or for the retry delay when the previous cycle
    /// could not resolve the public IP. `shutdown` interrupts both the
    /// sleep and an in-flight cycle.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            "Reconciling {} domain(s) every {} minutes",
            self.domains.len(),
            self.poll_interval.as_secs() / 60
        );

        let mut next_delay: Option<Duration> = None;

        loop {
            if let Some(delay) = next_delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut shutdown => break,
                }
            }

            let outcome = tokio::select! {
                outcome = self.run_cycle() => outcome,
                _ = &mut shutdown => break,
            };

            next_delay = Some(self.delay_after(&outcome));
        }

        info!("Shutdown signal received, reconciliation loop stopped");
        self.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        Ok(())
    }

    /// Perform exactly one reconciliation cycle
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let new_ip = match self.ip_source.current().await {
            Ok(ip) => ip,
            Err(e) => {
                warn!(
                    "Failed to get external IP address from {}: {}",
                    self.ip_source.source_name(),
                    e
                );
                self.emit_event(EngineEvent::IpUnavailable {
                    error: e.to_string(),
                });
                return CycleOutcome::IpUnavailable;
            }
        };

        if self.state.last_observed_ip == Some(new_ip) {
            info!("No changes detected in external IP ({})", new_ip);
            self.emit_event(EngineEvent::IpUnchanged { ip: new_ip });
            return CycleOutcome::Unchanged(new_ip);
        }

        let previous_ip = self.state.last_observed_ip.replace(new_ip);
        match previous_ip {
            Some(previous) => info!("External IP changed: {} -> {}", previous, new_ip),
            None => info!("External IP: {}", new_ip),
        }
        self.emit_event(EngineEvent::IpChanged {
            previous_ip,
            new_ip,
        });

        let mut summary = CycleSummary::default();
        for domain in &self.domains {
            match self.reconcile_domain(domain, new_ip).await {
                DomainOutcome::Skipped => summary.skipped += 1,
                DomainOutcome::Matched => summary.matched += 1,
                DomainOutcome::Updated(true) => summary.updated += 1,
                DomainOutcome::Updated(false) | DomainOutcome::UpdateFailed => summary.failed += 1,
            }
        }

        debug!("Cycle finished: {:?}", summary);
        CycleOutcome::Reconciled {
            ip: new_ip,
            summary,
        }
    }

    /// Bring one domain's record in line with `new_ip`
    async fn reconcile_domain(&self, domain: &str, new_ip: Ipv4Addr) -> DomainOutcome {
        info!("Checking {} to ensure it matches {}", domain, new_ip);

        let record_id = match self.provider.find_record_id(domain).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to get DNS record ID for domain ({}): {}", domain, e);
                self.emit_event(EngineEvent::RecordLookupFailed {
                    domain: domain.to_string(),
                    error: e.to_string(),
                });
                return DomainOutcome::Skipped;
            }
        };

        let current_content = match self.provider.fetch_record_content(&record_id).await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Failed to get IP address from DNS record {} ({}): {}",
                    record_id, domain, e
                );
                self.emit_event(EngineEvent::RecordFetchFailed {
                    domain: domain.to_string(),
                    record_id,
                    error: e.to_string(),
                });
                return DomainOutcome::Skipped;
            }
        };

        if current_content == new_ip.to_string() {
            info!("{} IP address matches. No update needed.", domain);
            self.emit_event(EngineEvent::RecordMatches {
                domain: domain.to_string(),
                ip: new_ip,
            });
            return DomainOutcome::Matched;
        }

        info!("IP addresses do not match for {}. Updating DNS record...", domain);
        info!("DNS record IP: {}", current_content);
        info!("External IP: {}", new_ip);

        match self.provider.update_record(&record_id, new_ip, domain).await {
            Ok(success) => {
                if success {
                    info!("{} DNS record update success: {}", domain, success);
                } else {
                    warn!("{} DNS record update success: {}", domain, success);
                }
                self.emit_event(EngineEvent::RecordUpdated {
                    domain: domain.to_string(),
                    record_id,
                    previous_content: current_content,
                    new_ip,
                    success,
                });
                DomainOutcome::Updated(success)
            }
            Err(e) => {
                error!(
                    "Failed to update DNS record via {} for {}: {}",
                    self.provider.provider_name(),
                    domain,
                    e
                );
                self.emit_event(EngineEvent::RecordUpdateFailed {
                    domain: domain.to_string(),
                    record_id,
                    error: e.to_string(),
                });
                DomainOutcome::UpdateFailed
            }
        }
    }

    /// How long to sleep before the next cycle
    fn delay_after(&self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::IpUnavailable => {
                info!("Retrying in {} seconds.", self.retry_delay.as_secs());
                self.retry_delay
            }
            _ => {
                info!("Waiting {} minutes.", self.poll_interval.as_secs() / 60);
                self.poll_interval
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event");
            }
            // Nobody is listening; events are optional
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
