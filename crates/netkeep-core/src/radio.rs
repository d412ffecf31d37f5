//! Station-mode radio abstraction.
//!
//! The orchestrator drives one radio interface through this trait. Platform
//! crates wrap the real driver; tests use a scripted implementation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One access point seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub ssid: String,
    /// Received signal strength in dBm.
    pub rssi: i8,
}

impl ScanResult {
    pub fn new(ssid: &str, rssi: i8) -> Self {
        Self {
            ssid: ssid.to_string(),
            rssi,
        }
    }
}

/// Strongest reading for `ssid` among `scan`.
pub fn strongest_signal(scan: &[ScanResult], ssid: &str) -> Option<i8> {
    scan.iter()
        .filter(|ap| ap.ssid == ssid)
        .map(|ap| ap.rssi)
        .max()
}

/// Association state reported by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// Associated and ready for traffic.
    Connected,
    /// Anything else: idle, connecting, or failed.
    Disconnected,
}

/// Errors reported by a radio driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Configuration rejected: {0}")]
    Configuration(String),

    #[error("Driver error: {0}")]
    Driver(String),
}

/// A single station interface.
pub trait Radio: Send {
    /// Scan for access points, optionally including hidden networks.
    fn scan(&mut self, include_hidden: bool) -> Result<Vec<ScanResult>, RadioError>;

    /// Drop any current association.
    fn disconnect(&mut self) -> Result<(), RadioError>;

    /// Apply the credential and start connecting without waiting for the link.
    fn configure_and_connect(&mut self, ssid: &str, password: &str) -> Result<(), RadioError>;

    fn status(&self) -> LinkStatus;

    /// SSID of the current association, if any.
    fn current_ssid(&self) -> Option<String>;

    /// Signal strength of the current association in dBm, if any.
    fn current_signal_strength(&self) -> Option<i8>;
}
