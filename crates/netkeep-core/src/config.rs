//! Configuration types shared across platforms.
//!
//! Defaults match the firmware constants. Binaries may override them from a
//! settings file; every field is optional in serialized form.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time allowed for a single connection attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 15_000;

/// Default interval between link status polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Default cap on candidates kept from one scan.
pub const DEFAULT_MAX_CANDIDATES: usize = 16;

/// Connection orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Time allowed for one connection attempt.
    pub attempt_timeout_ms: u64,

    /// Interval between status polls while an attempt is in progress.
    pub poll_interval_ms: u64,

    /// Settle time after disconnecting before a scan.
    pub scan_settle_ms: u64,

    /// Settle time after disconnecting before an attempt.
    pub connect_settle_ms: u64,

    /// Include hidden networks in scans.
    pub include_hidden: bool,

    /// Maximum number of candidates kept per pass.
    pub max_candidates: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            scan_settle_ms: 50,
            connect_settle_ms: 100,
            include_hidden: true,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

impl OrchestratorConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn scan_settle(&self) -> Duration {
        Duration::from_millis(self.scan_settle_ms)
    }

    pub fn connect_settle(&self) -> Duration {
        Duration::from_millis(self.connect_settle_ms)
    }
}

/// Where the credential blob lives in the key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    pub namespace: String,
    pub key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: "wifi".to_string(),
            key: "creds".to_string(),
        }
    }
}

/// A credential compiled into the firmware image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackNetwork {
    pub ssid: &'static str,
    pub password: &'static str,
}

impl FallbackNetwork {
    pub const fn new(ssid: &'static str, password: &'static str) -> Self {
        Self { ssid, password }
    }
}
