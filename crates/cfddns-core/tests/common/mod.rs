//! Test doubles and common utilities for reconciliation contract tests
//!
//! The doubles are cheap to clone; clones share their call logs so a test
//! can hand one copy to the engine and keep another for assertions.

#![allow(dead_code)]

use cfddns_core::error::{Error, Result};
use cfddns_core::traits::{DnsProvider, IpSource};
use cfddns_core::{Configuration, EngineEvent};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// An IpSource that replays scripted answers, then repeats a fallback
#[derive(Clone)]
pub struct ScriptedIpSource {
    /// Answers consumed in order; `None` means "resolution failed"
    script: Arc<Mutex<VecDeque<Option<Ipv4Addr>>>>,
    /// Answer once the script is exhausted
    fallback: Option<Ipv4Addr>,
    /// When current() was called
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl ScriptedIpSource {
    /// Always answer with `ip`
    pub fn fixed(ip: Ipv4Addr) -> Self {
        Self::scripted(Vec::new(), Some(ip))
    }

    /// Always fail
    pub fn failing() -> Self {
        Self::scripted(Vec::new(), None)
    }

    pub fn scripted(script: Vec<Option<Ipv4Addr>>, fallback: Option<Ipv4Addr>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fallback,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get the number of times current() was called
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Instants at which current() was called
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IpSource for ScriptedIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        self.calls.lock().unwrap().push(Instant::now());

        let answer = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        answer.ok_or_else(|| Error::ip_source("scripted failure"))
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A provider call as observed by [`MockDnsProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Find(String),
    Fetch(String),
    Update {
        record_id: String,
        new_ip: Ipv4Addr,
        domain: String,
    },
}

impl ProviderCall {
    pub fn find(domain: &str) -> Self {
        Self::Find(domain.to_string())
    }

    pub fn fetch(record_id: &str) -> Self {
        Self::Fetch(record_id.to_string())
    }

    pub fn update(record_id: &str, new_ip: Ipv4Addr, domain: &str) -> Self {
        Self::Update {
            record_id: record_id.to_string(),
            new_ip,
            domain: domain.to_string(),
        }
    }
}

#[derive(Default)]
struct ProviderState {
    /// domain -> record id
    ids: HashMap<String, String>,
    /// record id -> content
    contents: HashMap<String, String>,
    failing_fetches: HashSet<String>,
    failing_updates: HashSet<String>,
    rejected_updates: HashSet<String>,
    calls: Vec<ProviderCall>,
}

/// An in-memory DnsProvider that records every call
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an A record
    pub fn with_record(self, domain: &str, record_id: &str, content: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.ids.insert(domain.to_string(), record_id.to_string());
            state
                .contents
                .insert(record_id.to_string(), content.to_string());
        }
        self
    }

    /// Make fetches of `record_id` fail
    pub fn failing_fetch(self, record_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_fetches
            .insert(record_id.to_string());
        self
    }

    /// Make updates of `record_id` fail at the transport level
    pub fn failing_update(self, record_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_updates
            .insert(record_id.to_string());
        self
    }

    /// Make updates of `record_id` come back with `success: false`
    pub fn rejecting_update(self, record_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .rejected_updates
            .insert(record_id.to_string());
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Only the update calls
    pub fn updates(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, ProviderCall::Update { .. }))
            .collect()
    }

    /// Current content of a record
    pub fn content(&self, record_id: &str) -> Option<String> {
        self.state.lock().unwrap().contents.get(record_id).cloned()
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn find_record_id(&self, domain: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::find(domain));
        state
            .ids
            .get(domain)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("DNS record not found: {}", domain)))
    }

    async fn fetch_record_content(&self, record_id: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::fetch(record_id));
        if state.failing_fetches.contains(record_id) {
            return Err(Error::provider("mock", "fetch failed"));
        }
        state
            .contents
            .get(record_id)
            .cloned()
            .ok_or_else(|| Error::not_found(record_id.to_string()))
    }

    async fn update_record(&self, record_id: &str, new_ip: Ipv4Addr, domain: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::update(record_id, new_ip, domain));
        if state.failing_updates.contains(record_id) {
            return Err(Error::http("connection reset"));
        }
        if state.rejected_updates.contains(record_id) {
            return Ok(false);
        }
        state
            .contents
            .insert(record_id.to_string(), new_ip.to_string());
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Helper to create a minimal Configuration for testing
pub fn minimal_config(domains: &[&str]) -> Configuration {
    Configuration {
        zone_id: "9f86d081884c7d659a2feaa0c55ad015".to_string(),
        api_token: "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3".to_string(),
        domains: domains.iter().map(|d| d.to_string()).collect(),
        poll_interval_minutes: 120,
        retry_delay_secs: 60,
        request_timeout_secs: 30,
        ip_echo_url: "https://api.ipify.org".to_string(),
    }
}

/// Collect every event emitted so far
pub fn drain_events(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
