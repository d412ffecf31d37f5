//! netkeep firmware for ESP32.
//!
//! Boots the known-network manager against NVS and the station radio, then
//! serves the management API with `EspHttpServer`.
//!
//! This binary requires the ESP32 Rust toolchain.
//! It will not compile with the standard Rust toolchain.

use std::sync::Arc;
use std::time::Duration;

use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::prelude::Peripherals,
    http::server::{Configuration, EspHttpServer},
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
};
use log::{info, warn};
use netkeep_core::{
    CredentialStore, FallbackNetwork, NetworkManager, Orchestrator, OrchestratorConfig,
    StoreConfig, SystemClock,
};
use netkeep_esp32::{http::register_handlers, nvs::NvsPersistence, wifi::EspRadio};

/// Networks tried when no saved network is in range.
const FALLBACK: &[FallbackNetwork] = &[
    FallbackNetwork::new("netkeep-setup", "netkeep-setup"),
    FallbackNetwork::new("OpenLab", ""),
];

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    info!("netkeep firmware starting...");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let radio = EspRadio::new(peripherals.modem, sysloop, Some(nvs.clone()))?;
    let manager = Arc::new(NetworkManager::new(
        CredentialStore::new(NvsPersistence::new(nvs), StoreConfig::default()),
        Orchestrator::new(radio, SystemClock::new(), OrchestratorConfig::default()),
        FALLBACK,
    ));

    let report = manager.boot();
    if report.ok {
        let ip = manager.with_radio(|radio| radio.ip_address());
        info!(
            "Joined '{}' from {} list, IP {}",
            report.ssid.as_deref().unwrap_or_default(),
            report.source,
            ip.as_deref().unwrap_or("pending")
        );
    } else {
        warn!(
            "No network joined at boot: {}",
            report.message.as_deref().unwrap_or("unknown error")
        );
    }

    let mut server = EspHttpServer::new(&Configuration {
        uri_match_wildcard: true,
        stack_size: 10240,
        ..Default::default()
    })?;
    register_handlers(&mut server, manager)?;
    info!("Management API ready on port 80");

    // The server runs on its own task; keep it alive.
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}
