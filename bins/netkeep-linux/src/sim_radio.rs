//! Simulated station radio.
//!
//! The air is described by a JSON file:
//!
//! ```json
//! { "networks": [ { "ssid": "HomeNet", "rssi": -55, "password": "secret" },
//!                 { "ssid": "Cellar", "rssi": -80, "hidden": true } ] }
//! ```
//!
//! The file is re-read on every scan, so editing it changes what the next
//! cycle sees. A connection succeeds when the SSID is on the air and the
//! password matches; networks without a password are open.

use std::fs;
use std::path::{Path, PathBuf};

use netkeep_core::{LinkStatus, Radio, RadioError, ScanResult};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// One simulated access point.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulatedNetwork {
    pub ssid: String,
    pub rssi: i8,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Deserialize)]
struct AirFile {
    networks: Vec<SimulatedNetwork>,
}

#[derive(Debug)]
pub struct SimulatedRadio {
    source: Option<PathBuf>,
    air: Vec<SimulatedNetwork>,
    associated: Option<SimulatedNetwork>,
}

impl SimulatedRadio {
    pub fn new(air: Vec<SimulatedNetwork>) -> Self {
        Self {
            source: None,
            air,
            associated: None,
        }
    }

    /// Radio backed by a JSON description of the air.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, RadioError> {
        let path = path.into();
        let air = read_air(&path)?;
        info!("Simulated radio sees {} networks from {}", air.len(), path.display());
        Ok(Self {
            source: Some(path),
            air,
            associated: None,
        })
    }

    /// Nothing on the air. Every cycle fails until networks are configured.
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    fn refresh(&mut self) -> Result<(), RadioError> {
        if let Some(path) = &self.source {
            self.air = read_air(path)?;
        }
        Ok(())
    }
}

fn read_air(path: &Path) -> Result<Vec<SimulatedNetwork>, RadioError> {
    let text = fs::read_to_string(path)
        .map_err(|e| RadioError::Scan(format!("{}: {}", path.display(), e)))?;
    let file: AirFile = serde_json::from_str(&text)
        .map_err(|e| RadioError::Scan(format!("{}: {}", path.display(), e)))?;
    Ok(file.networks)
}

impl Radio for SimulatedRadio {
    fn scan(&mut self, include_hidden: bool) -> Result<Vec<ScanResult>, RadioError> {
        self.refresh()?;
        let results: Vec<ScanResult> = self
            .air
            .iter()
            .filter(|net| include_hidden || !net.hidden)
            .map(|net| ScanResult::new(&net.ssid, net.rssi))
            .collect();
        debug!("Scan found {} networks", results.len());
        Ok(results)
    }

    fn disconnect(&mut self) -> Result<(), RadioError> {
        if let Some(net) = self.associated.take() {
            debug!("Disconnected from '{}'", net.ssid);
        }
        Ok(())
    }

    fn configure_and_connect(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        self.associated = None;
        match self.air.iter().find(|net| net.ssid == ssid) {
            Some(net) if net.password == password => {
                self.associated = Some(net.clone());
            }
            Some(_) => warn!("Authentication with '{}' will fail: wrong password", ssid),
            None => debug!("'{}' is not on the air", ssid),
        }
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        if self.associated.is_some() {
            LinkStatus::Connected
        } else {
            LinkStatus::Disconnected
        }
    }

    fn current_ssid(&self) -> Option<String> {
        self.associated.as_ref().map(|net| net.ssid.clone())
    }

    fn current_signal_strength(&self) -> Option<i8> {
        self.associated.as_ref().map(|net| net.rssi)
    }
}
