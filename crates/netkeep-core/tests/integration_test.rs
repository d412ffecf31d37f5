//! End-to-end tests for the connection cycle.
//!
//! These wire a real credential store, the orchestrator and the manager
//! together over in-memory persistence and a scripted radio.

use std::time::Duration;

use netkeep_core::testing::{Join, ManualClock, ScriptedRadio};
use netkeep_core::{
    CredentialSource, CredentialStore, FallbackNetwork, MemoryPersistence, NetworkManager,
    NetworkService, Orchestrator, OrchestratorConfig, ScanResult, StoreConfig,
};

static FALLBACK: &[FallbackNetwork] = &[
    FallbackNetwork::new("Office", "fb-pass"),
    FallbackNetwork::new("Workshop", "fb-pass-2"),
];

fn home_and_office() -> Vec<ScanResult> {
    vec![ScanResult::new("HomeNet", -55), ScanResult::new("Office", -30)]
}

/// Store with slot 1 = ("HomeNet", "secret1") already persisted.
fn seeded_backing() -> MemoryPersistence {
    let backing = MemoryPersistence::new();
    let mut store = CredentialStore::new(backing.clone(), StoreConfig::default());
    store.add_or_update("HomeNet", "secret1").unwrap();
    backing
}

fn start(
    backing: &MemoryPersistence,
    radio: ScriptedRadio,
) -> NetworkManager<MemoryPersistence, ScriptedRadio, ManualClock> {
    NetworkManager::new(
        CredentialStore::new(backing.clone(), StoreConfig::default()),
        Orchestrator::new(radio, ManualClock::new(), OrchestratorConfig::default()),
        FALLBACK,
    )
}

#[test]
fn test_saved_network_joins_without_fallback() {
    let backing = seeded_backing();
    let radio = ScriptedRadio::new(home_and_office())
        .join("HomeNet", Join::AfterPolls(4))
        .join("Office", Join::AfterPolls(0));
    let manager = start(&backing, radio);

    let report = manager.boot();

    assert!(report.ok);
    assert_eq!(report.source, "saved");
    assert_eq!(report.ssid.as_deref(), Some("HomeNet"));
    manager.with_radio(|radio| {
        assert_eq!(radio.attempted(), vec!["HomeNet"]);
        assert_eq!(radio.scan_count(), 1);
    });
}

#[test]
fn test_saved_timeout_then_fallback_joins() {
    let backing = seeded_backing();
    let radio = ScriptedRadio::new(home_and_office())
        .join("HomeNet", Join::Never)
        .join("Office", Join::AfterPolls(1));
    let manager = start(&backing, radio);

    let report = manager.boot();

    assert!(report.ok);
    assert_eq!(report.source, "fallback");
    assert_eq!(report.ssid.as_deref(), Some("Office"));
    assert_eq!(report.attempts, 2);
    manager.with_radio(|radio| {
        assert_eq!(radio.attempted(), vec!["HomeNet", "Office"]);
    });
}

#[test]
fn test_every_mutation_is_durable() {
    let backing = MemoryPersistence::new();
    let manager = start(&backing, ScriptedRadio::new(Vec::new()));
    manager.boot();

    manager.add_network("A", "pa").unwrap();
    manager.add_network("B", "pb").unwrap();
    manager.add_network("A", "pa2").unwrap();
    manager.delete_network(2).unwrap();

    // A fresh store over the same backing sees exactly what the manager lists
    let mut reopened = CredentialStore::new(backing.clone(), StoreConfig::default());
    reopened.load();
    assert_eq!(reopened.list(), manager.list_networks());
    assert_eq!(
        reopened.table().get(1).map(|c| c.password.as_str()),
        Some("pa2")
    );
}

#[test]
fn test_orchestrator_direct_cycle_reports_source() {
    let backing = seeded_backing();
    let mut store = CredentialStore::new(backing, StoreConfig::default());
    let table = store.load().clone();

    let radio = ScriptedRadio::new(vec![
        ScanResult::new("Workshop", -45),
        ScanResult::new("Office", -45),
    ])
    .join("Workshop", Join::AfterPolls(0));
    let mut orchestrator =
        Orchestrator::new(radio, ManualClock::new(), OrchestratorConfig::default());

    let outcome = orchestrator
        .connect_preferring_saved(&table, FALLBACK, Duration::from_millis(500))
        .unwrap();

    // Equal signal: scan order decides, so Workshop goes first
    assert_eq!(outcome.source, CredentialSource::Fallback);
    assert_eq!(outcome.ssid, "Workshop");
    assert_eq!(outcome.attempts, 1);
}
