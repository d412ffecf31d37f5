//! Management interface over the credential store and orchestrator.
//!
//! [`NetworkManager`] owns both components behind mutexes and exposes the
//! operations a management front end needs through [`NetworkService`].
//! Framework-specific code (Axum, esp-idf-http) renders the returned reports.
//!
//! Locking: a reconnect cycle holds the orchestrator for its whole duration
//! and ranks against a snapshot of the table taken under the store lock, so
//! credential edits never race a ranking pass and cycles never overlap.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::FallbackNetwork;
use crate::credentials::{CredentialError, CredentialStore, SlotInfo};
use crate::orchestrator::{ConnectError, Orchestrator};
use crate::persistence::{Persistence, StoreError};
use crate::radio::{LinkStatus, Radio};

/// Result of adding or updating a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddReport {
    pub ok: bool,
    pub slot: usize,
    pub updated: bool,
}

/// Result of deleting a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub ok: bool,
    pub slot: usize,
    /// False when the slot was already empty.
    pub removed: bool,
    pub was_active: bool,
}

/// Result of a reconnect cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconnectReport {
    pub ok: bool,
    /// `saved`, `fallback` or `none`.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReconnectReport {
    fn from_result(result: Result<crate::orchestrator::ConnectOutcome, ConnectError>) -> Self {
        match result {
            Ok(outcome) => Self {
                ok: true,
                source: outcome.source.to_string(),
                ssid: Some(outcome.ssid),
                attempts: outcome.attempts,
                error: None,
                message: None,
            },
            Err(e) => Self {
                ok: false,
                source: "none".to_string(),
                ssid: None,
                attempts: e.attempts(),
                error: Some(e.code().to_string()),
                message: Some(e.to_string()),
            },
        }
    }
}

/// Current association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i8>,
    /// A reconnect cycle is running.
    pub busy: bool,
}

/// Machine-readable reason codes.
pub trait ErrorCode {
    fn code(&self) -> &'static str;
}

impl ErrorCode for CredentialError {
    fn code(&self) -> &'static str {
        match self {
            CredentialError::InvalidInput(_) => "invalid_input",
            CredentialError::NoFreeSlots => "no_free_slots",
            CredentialError::OutOfRange(_) => "out_of_range",
            CredentialError::Store(_) => "store_error",
        }
    }
}

impl ErrorCode for ConnectError {
    fn code(&self) -> &'static str {
        match self {
            ConnectError::ScanFailed { .. } => "scan_failed",
            ConnectError::ConnectFailed { .. } => "connect_failed",
        }
    }
}

/// Operations offered to management front ends.
///
/// All methods block; async callers should run them on a blocking pool.
pub trait NetworkService: Send + Sync {
    /// Every slot, filled or not, in slot order.
    fn list_networks(&self) -> Vec<SlotInfo>;

    fn add_network(&self, ssid: &str, password: &str) -> Result<AddReport, CredentialError>;

    fn delete_network(&self, slot: usize) -> Result<DeleteReport, CredentialError>;

    /// Run one saved-then-fallback cycle, waiting for any cycle in progress.
    fn trigger_reconnect(&self) -> ReconnectReport;

    fn link_status(&self) -> LinkReport;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the credential store and the orchestrator for one radio.
pub struct NetworkManager<P, R, C> {
    store: Mutex<CredentialStore<P>>,
    orchestrator: Mutex<Orchestrator<R, C>>,
    fallback: &'static [FallbackNetwork],
}

impl<P: Persistence, R: Radio, C: Clock> NetworkManager<P, R, C> {
    pub fn new(
        store: CredentialStore<P>,
        orchestrator: Orchestrator<R, C>,
        fallback: &'static [FallbackNetwork],
    ) -> Self {
        Self {
            store: Mutex::new(store),
            orchestrator: Mutex::new(orchestrator),
            fallback,
        }
    }

    /// Prepare and load the store, then run the first connection cycle.
    pub fn boot(&self) -> ReconnectReport {
        {
            let mut store = lock(&self.store);
            if let Err(e) = store.initialize() {
                warn!("Credential store initialization failed: {}", e);
            }
            store.load();
        }

        let report = self.trigger_reconnect();
        if !report.ok {
            warn!("WiFi NOT connected (no known networks or all failed)");
        }
        report
    }

    /// Retry persisting the current table after a failed mutation.
    pub fn save(&self) -> Result<(), StoreError> {
        lock(&self.store).save()
    }

    /// Inspect the radio, waiting for any cycle in progress.
    pub fn with_radio<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(lock(&self.orchestrator).radio())
    }

    /// SSID of the current association, or `None` while a cycle is running.
    fn active_ssid(&self) -> Option<String> {
        match self.orchestrator.try_lock() {
            Ok(orchestrator) => orchestrator.radio().current_ssid(),
            Err(_) => None,
        }
    }
}

impl<P, R, C> NetworkService for NetworkManager<P, R, C>
where
    P: Persistence,
    R: Radio,
    C: Clock,
{
    fn list_networks(&self) -> Vec<SlotInfo> {
        lock(&self.store).list()
    }

    fn add_network(&self, ssid: &str, password: &str) -> Result<AddReport, CredentialError> {
        let outcome = lock(&self.store).add_or_update(ssid, password)?;
        Ok(AddReport {
            ok: true,
            slot: outcome.slot,
            updated: outcome.updated,
        })
    }

    fn delete_network(&self, slot: usize) -> Result<DeleteReport, CredentialError> {
        let active = self.active_ssid();
        let outcome = lock(&self.store).delete(slot, active.as_deref())?;
        Ok(DeleteReport {
            ok: true,
            slot: outcome.slot,
            removed: outcome.removed,
            was_active: outcome.was_active,
        })
    }

    fn trigger_reconnect(&self) -> ReconnectReport {
        let mut orchestrator = lock(&self.orchestrator);
        let snapshot = lock(&self.store).table().clone();
        let timeout = orchestrator.config().attempt_timeout();

        let result = orchestrator.connect_preferring_saved(&snapshot, self.fallback, timeout);
        let report = ReconnectReport::from_result(result);
        info!(
            "Reconnect finished: ok={} source={} attempts={}",
            report.ok, report.source, report.attempts
        );
        report
    }

    fn link_status(&self) -> LinkReport {
        match self.orchestrator.try_lock() {
            Ok(orchestrator) => {
                let radio = orchestrator.radio();
                let connected = radio.status() == LinkStatus::Connected;
                LinkReport {
                    connected,
                    ssid: radio.current_ssid(),
                    rssi: radio.current_signal_strength(),
                    busy: false,
                }
            }
            Err(_) => LinkReport {
                connected: false,
                ssid: None,
                rssi: None,
                busy: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OrchestratorConfig, StoreConfig};
    use crate::persistence::MemoryPersistence;
    use crate::radio::ScanResult;
    use crate::testing::{Join, ManualClock, ScriptedRadio};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    static FALLBACK: &[FallbackNetwork] = &[FallbackNetwork::new("Office", "fb-pass")];

    type TestManager = NetworkManager<MemoryPersistence, ScriptedRadio, ManualClock>;

    fn manager(backing: &MemoryPersistence, radio: ScriptedRadio) -> TestManager {
        NetworkManager::new(
            CredentialStore::new(backing.clone(), StoreConfig::default()),
            Orchestrator::new(radio, ManualClock::new(), OrchestratorConfig::default()),
            FALLBACK,
        )
    }

    fn visible() -> Vec<ScanResult> {
        vec![ScanResult::new("HomeNet", -55), ScanResult::new("Office", -30)]
    }

    #[test]
    fn test_boot_loads_and_connects_saved() {
        let backing = MemoryPersistence::new();
        backing.insert_raw(
            "wifi",
            "creds",
            vec![7, b'H', b'o', b'm', b'e', b'N', b'e', b't', 1, b's'],
        );
        let radio = ScriptedRadio::new(visible()).join("HomeNet", Join::AfterPolls(1));
        let manager = manager(&backing, radio);

        let report = manager.boot();
        assert!(report.ok);
        assert_eq!(report.source, "saved");
        assert_eq!(report.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(manager.list_networks()[0].ssid, "HomeNet");
    }

    #[test]
    fn test_boot_on_fresh_store_uses_fallback() {
        let backing = MemoryPersistence::new();
        let radio = ScriptedRadio::new(visible()).join("Office", Join::AfterPolls(0));
        let manager = manager(&backing, radio);

        let report = manager.boot();
        assert_eq!(report.source, "fallback");
        assert_eq!(backing.raw("wifi", "creds"), Some(vec![0u8; 10]));
    }

    #[test]
    fn test_boot_survives_unavailable_store() {
        let backing = MemoryPersistence::new();
        backing.set_unavailable(true);
        let radio = ScriptedRadio::new(visible()).join("Office", Join::AfterPolls(0));
        let manager = manager(&backing, radio);

        let report = manager.boot();
        assert!(report.ok);
        assert!(manager.list_networks().iter().all(|s| !s.filled));
    }

    #[test]
    fn test_reconnect_failure_report() {
        let backing = MemoryPersistence::new();
        let manager = manager(&backing, ScriptedRadio::new(visible()));

        let report = manager.trigger_reconnect();
        assert_eq!(
            report,
            ReconnectReport {
                ok: false,
                source: "none".to_string(),
                ssid: None,
                attempts: 1,
                error: Some("connect_failed".to_string()),
                message: Some("No network joined after 1 attempts".to_string()),
            }
        );
    }

    #[test]
    fn test_added_network_is_used_on_reconnect() {
        let backing = MemoryPersistence::new();
        let radio = ScriptedRadio::new(visible())
            .join("HomeNet", Join::AfterPolls(0))
            .join("Office", Join::AfterPolls(0));
        let manager = manager(&backing, radio);

        let added = manager.add_network("HomeNet", "secret1").unwrap();
        assert_eq!(
            added,
            AddReport {
                ok: true,
                slot: 1,
                updated: false
            }
        );

        let report = manager.trigger_reconnect();
        assert_eq!(report.source, "saved");
        assert_eq!(report.ssid.as_deref(), Some("HomeNet"));
    }

    #[test]
    fn test_delete_reports_active_network() {
        let backing = MemoryPersistence::new();
        let radio = ScriptedRadio::new(visible()).join("HomeNet", Join::AfterPolls(0));
        let manager = manager(&backing, radio);

        manager.add_network("HomeNet", "secret1").unwrap();
        manager.add_network("Cafe", "latte").unwrap();
        assert!(manager.trigger_reconnect().ok);

        let cafe = manager.delete_network(2).unwrap();
        assert!(cafe.removed);
        assert!(!cafe.was_active);

        let home = manager.delete_network(1).unwrap();
        assert!(home.was_active);

        let again = manager.delete_network(1).unwrap();
        assert!(!again.removed);
    }

    #[test]
    fn test_errors_carry_codes() {
        let backing = MemoryPersistence::new();
        let manager = manager(&backing, ScriptedRadio::new(visible()));

        let err = manager.delete_network(11).unwrap_err();
        assert_eq!(err.code(), "out_of_range");

        let err = manager.add_network("", "pw").unwrap_err();
        assert_eq!(err.code(), "invalid_input");

        backing.set_unavailable(true);
        let err = manager.add_network("HomeNet", "pw").unwrap_err();
        assert_eq!(err.code(), "store_error");

        // The edit stays in memory and can be saved once storage is back
        backing.set_unavailable(false);
        manager.save().unwrap();
        assert!(backing.raw("wifi", "creds").is_some());
    }

    #[test]
    fn test_link_status() {
        let backing = MemoryPersistence::new();
        let radio = ScriptedRadio::new(visible()).join("Office", Join::AfterPolls(0));
        let manager = manager(&backing, radio);

        assert!(!manager.link_status().connected);
        manager.trigger_reconnect();

        let status = manager.link_status();
        assert_eq!(
            status,
            LinkReport {
                connected: true,
                ssid: Some("Office".to_string()),
                rssi: Some(-30),
                busy: false,
            }
        );
    }

    #[test]
    fn test_reconnects_are_serialized() {
        let backing = MemoryPersistence::new();
        let radio = ScriptedRadio::new(visible()).join("Office", Join::AfterPolls(0));
        let manager: Arc<dyn NetworkService> = Arc::new(manager(&backing, radio));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || manager.trigger_reconnect())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().ok);
        }
    }
}
