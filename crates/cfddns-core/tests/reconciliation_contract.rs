//! Contract Test: Reconciliation Cycle
//!
//! Verifies the per-cycle decisions of the Reconciler:
//! - Provider calls happen only when the public IP changed
//! - A record is updated only when its content differs from the public IP
//! - Domains are processed in order and independently of each other

mod common;

use cfddns_core::{CycleOutcome, CycleSummary, EngineEvent, Reconciler};
use common::*;
use std::net::Ipv4Addr;

const IP: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 1);

fn engine(
    ip_source: &ScriptedIpSource,
    provider: &MockDnsProvider,
    domains: &[&str],
) -> (Reconciler, tokio::sync::mpsc::Receiver<EngineEvent>) {
    Reconciler::new(
        Box::new(ip_source.clone()),
        Box::new(provider.clone()),
        &minimal_config(domains),
    )
    .expect("engine construction succeeds")
}

#[tokio::test]
async fn end_to_end_updates_stale_record_and_skips_matching_one() {
    let ip_source = ScriptedIpSource::fixed(IP);
    let provider = MockDnsProvider::new()
        .with_record("a.example.com", "rec1", "198.51.100.0")
        .with_record("b.example.com", "rec2", "198.51.100.1");

    let (mut engine, mut rx) = engine(&ip_source, &provider, &["a.example.com", "b.example.com"]);

    let outcome = engine.run_cycle().await;

    assert_eq!(
        outcome,
        CycleOutcome::Reconciled {
            ip: IP,
            summary: CycleSummary {
                updated: 1,
                matched: 1,
                ..CycleSummary::default()
            },
        }
    );

    assert_eq!(
        provider.calls(),
        vec![
            ProviderCall::find("a.example.com"),
            ProviderCall::fetch("rec1"),
            ProviderCall::update("rec1", IP, "a.example.com"),
            ProviderCall::find("b.example.com"),
            ProviderCall::fetch("rec2"),
        ]
    );
    assert_eq!(provider.content("rec1").as_deref(), Some("198.51.100.1"));

    let events = drain_events(&mut rx);
    assert_eq!(
        events,
        vec![
            EngineEvent::IpChanged {
                previous_ip: None,
                new_ip: IP,
            },
            EngineEvent::RecordUpdated {
                domain: "a.example.com".to_string(),
                record_id: "rec1".to_string(),
                previous_content: "198.51.100.0".to_string(),
                new_ip: IP,
                success: true,
            },
            EngineEvent::RecordMatches {
                domain: "b.example.com".to_string(),
                ip: IP,
            },
        ]
    );
}

#[tokio::test]
async fn unchanged_ip_makes_no_provider_calls() {
    let ip_source = ScriptedIpSource::fixed(Ipv4Addr::new(203, 0, 113, 5));
    let provider = MockDnsProvider::new().with_record("a.example.com", "rec1", "192.0.2.1");

    let (mut engine, mut rx) = engine(&ip_source, &provider, &["a.example.com"]);

    engine.run_cycle().await;
    let calls_after_first = provider.calls().len();
    drain_events(&mut rx);

    let outcome = engine.run_cycle().await;

    assert_eq!(outcome, CycleOutcome::Unchanged(Ipv4Addr::new(203, 0, 113, 5)));
    assert_eq!(provider.calls().len(), calls_after_first);
    assert_eq!(
        drain_events(&mut rx),
        vec![EngineEvent::IpUnchanged {
            ip: Ipv4Addr::new(203, 0, 113, 5)
        }]
    );
}

#[tokio::test]
async fn matching_record_is_never_updated() {
    let ip_source = ScriptedIpSource::fixed(IP);
    let provider = MockDnsProvider::new().with_record("a.example.com", "rec1", "198.51.100.1");

    let (mut engine, _rx) = engine(&ip_source, &provider, &["a.example.com"]);
    engine.run_cycle().await;

    assert!(provider.updates().is_empty());
}

#[tokio::test]
async fn differing_record_is_updated_exactly_once_with_new_ip() {
    let ip_source = ScriptedIpSource::fixed(IP);
    let provider = MockDnsProvider::new().with_record("a.example.com", "rec1", "10.0.0.1");

    let (mut engine, _rx) = engine(&ip_source, &provider, &["a.example.com"]);
    engine.run_cycle().await;

    assert_eq!(
        provider.updates(),
        vec![ProviderCall::update("rec1", IP, "a.example.com")]
    );
}

#[tokio::test]
async fn rejected_update_reports_success_false() {
    let ip_source = ScriptedIpSource::fixed(IP);
    let provider = MockDnsProvider::new()
        .with_record("a.example.com", "rec1", "10.0.0.1")
        .rejecting_update("rec1");

    let (mut engine, mut rx) = engine(&ip_source, &provider, &["a.example.com"]);
    let outcome = engine.run_cycle().await;

    assert_eq!(
        outcome,
        CycleOutcome::Reconciled {
            ip: IP,
            summary: CycleSummary {
                failed: 1,
                ..CycleSummary::default()
            },
        }
    );
    assert!(drain_events(&mut rx).iter().any(|event| matches!(
        event,
        EngineEvent::RecordUpdated { success: false, .. }
    )));
}

#[tokio::test]
async fn lookup_failure_skips_only_that_domain() {
    let ip_source = ScriptedIpSource::fixed(IP);
    let provider = MockDnsProvider::new().with_record("b.example.com", "rec2", "10.0.0.2");

    let (mut engine, mut rx) = engine(&ip_source, &provider, &["missing.example.com", "b.example.com"]);
    let outcome = engine.run_cycle().await;

    assert_eq!(
        provider.calls(),
        vec![
            ProviderCall::find("missing.example.com"),
            ProviderCall::find("b.example.com"),
            ProviderCall::fetch("rec2"),
            ProviderCall::update("rec2", IP, "b.example.com"),
        ]
    );
    assert_eq!(
        outcome,
        CycleOutcome::Reconciled {
            ip: IP,
            summary: CycleSummary {
                updated: 1,
                skipped: 1,
                ..CycleSummary::default()
            },
        }
    );
    assert!(drain_events(&mut rx).iter().any(|event| matches!(
        event,
        EngineEvent::RecordLookupFailed { domain, .. } if domain == "missing.example.com"
    )));
}

#[tokio::test]
async fn fetch_failure_skips_only_that_domain() {
    let ip_source = ScriptedIpSource::fixed(IP);
    let provider = MockDnsProvider::new()
        .with_record("a.example.com", "rec1", "10.0.0.1")
        .with_record("b.example.com", "rec2", "10.0.0.2")
        .failing_fetch("rec1");

    let (mut engine, _rx) = engine(&ip_source, &provider, &["a.example.com", "b.example.com"]);
    engine.run_cycle().await;

    assert_eq!(
        provider.updates(),
        vec![ProviderCall::update("rec2", IP, "b.example.com")]
    );
}

#[tokio::test]
async fn update_error_does_not_stop_later_domains() {
    let ip_source = ScriptedIpSource::fixed(IP);
    let provider = MockDnsProvider::new()
        .with_record("a.example.com", "rec1", "10.0.0.1")
        .with_record("b.example.com", "rec2", "10.0.0.2")
        .failing_update("rec1");

    let (mut engine, mut rx) = engine(&ip_source, &provider, &["a.example.com", "b.example.com"]);
    let outcome = engine.run_cycle().await;

    assert_eq!(provider.updates().len(), 2);
    assert_eq!(provider.content("rec2").as_deref(), Some("198.51.100.1"));
    assert_eq!(
        outcome,
        CycleOutcome::Reconciled {
            ip: IP,
            summary: CycleSummary {
                updated: 1,
                failed: 1,
                ..CycleSummary::default()
            },
        }
    );
    assert!(drain_events(&mut rx).iter().any(|event| matches!(
        event,
        EngineEvent::RecordUpdateFailed { record_id, .. } if record_id == "rec1"
    )));
}

#[tokio::test]
async fn new_ip_triggers_another_round() {
    let second = Ipv4Addr::new(198, 51, 100, 2);
    let ip_source = ScriptedIpSource::scripted(vec![Some(IP)], Some(second));
    let provider = MockDnsProvider::new().with_record("a.example.com", "rec1", "10.0.0.1");

    let (mut engine, mut rx) = engine(&ip_source, &provider, &["a.example.com"]);

    engine.run_cycle().await;
    drain_events(&mut rx);
    engine.run_cycle().await;

    assert_eq!(
        provider.updates(),
        vec![
            ProviderCall::update("rec1", IP, "a.example.com"),
            ProviderCall::update("rec1", second, "a.example.com"),
        ]
    );
    assert_eq!(engine.state().last_observed_ip, Some(second));
    assert_eq!(
        drain_events(&mut rx).first(),
        Some(&EngineEvent::IpChanged {
            previous_ip: Some(IP),
            new_ip: second,
        })
    );
}

#[tokio::test]
async fn resolver_failure_makes_no_provider_calls() {
    let ip_source = ScriptedIpSource::failing();
    let provider = MockDnsProvider::new().with_record("a.example.com", "rec1", "10.0.0.1");

    let (mut engine, _rx) = engine(&ip_source, &provider, &["a.example.com"]);

    assert_eq!(engine.run_cycle().await, CycleOutcome::IpUnavailable);
    assert!(provider.calls().is_empty());
    assert_eq!(engine.state().last_observed_ip, None);
}

#[tokio::test]
async fn resolver_failure_after_success_keeps_last_ip() {
    let ip_source = ScriptedIpSource::scripted(vec![Some(IP), None], Some(IP));
    let provider = MockDnsProvider::new().with_record("a.example.com", "rec1", "10.0.0.1");

    let (mut engine, _rx) = engine(&ip_source, &provider, &["a.example.com"]);

    engine.run_cycle().await;
    assert_eq!(engine.run_cycle().await, CycleOutcome::IpUnavailable);
    assert_eq!(engine.state().last_observed_ip, Some(IP));

    // Same IP comes back: still no change
    assert_eq!(engine.run_cycle().await, CycleOutcome::Unchanged(IP));
    assert_eq!(provider.updates().len(), 1);
}
