//! ESP32 station radio.
//!
//! Wraps `BlockingWifi<EspWifi>` behind the [`Radio`] trait. Connecting is
//! started without waiting; the orchestrator polls [`Radio::status`] until the
//! interface is up or its attempt times out.

use anyhow::Result;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::peripheral,
    nvs::EspDefaultNvsPartition,
    wifi::{
        config::ScanConfig, AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi,
    },
};
use log::{debug, info, warn};
use netkeep_core::{strongest_signal, LinkStatus, Radio, RadioError, ScanResult};

pub struct EspRadio {
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Results of the latest scan; signal strength is read from here.
    last_scan: Vec<ScanResult>,
}

impl EspRadio {
    /// Take the modem and start the station interface with an empty
    /// configuration so it can scan.
    pub fn new(
        modem: impl peripheral::Peripheral<P = esp_idf_svc::hal::modem::Modem> + 'static,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        wifi.start()?;
        info!("WiFi station started");

        Ok(Self {
            wifi,
            last_scan: Vec::new(),
        })
    }

    /// IP address of the station interface, once the link is up.
    pub fn ip_address(&self) -> Option<String> {
        let info = self.wifi.wifi().sta_netif().get_ip_info().ok()?;
        Some(info.ip.to_string())
    }
}

impl Radio for EspRadio {
    fn scan(&mut self, include_hidden: bool) -> Result<Vec<ScanResult>, RadioError> {
        let config = ScanConfig {
            show_hidden: include_hidden,
            ..Default::default()
        };
        let wifi = self.wifi.wifi_mut();
        wifi.start_scan(&config, true)
            .map_err(|e| RadioError::Scan(e.to_string()))?;
        let ap_infos = wifi
            .get_scan_result()
            .map_err(|e| RadioError::Scan(e.to_string()))?;

        debug!("Scan returned {} access points", ap_infos.len());
        self.last_scan = ap_infos
            .into_iter()
            .map(|ap| ScanResult::new(ap.ssid.as_str(), ap.signal_strength))
            .collect();
        Ok(self.last_scan.clone())
    }

    fn disconnect(&mut self) -> Result<(), RadioError> {
        self.wifi
            .wifi_mut()
            .disconnect()
            .map_err(|e| RadioError::Driver(e.to_string()))
    }

    fn configure_and_connect(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        let config = ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| RadioError::Configuration(format!("SSID '{}' too long", ssid)))?,
            password: password
                .try_into()
                .map_err(|_| RadioError::Configuration("password too long".to_string()))?,
            auth_method,
            ..Default::default()
        };

        self.wifi
            .set_configuration(&Configuration::Client(config))
            .map_err(|e| RadioError::Configuration(e.to_string()))?;

        debug!("Connecting to '{}'...", ssid);
        self.wifi
            .wifi_mut()
            .connect()
            .map_err(|e| RadioError::Driver(e.to_string()))
    }

    fn status(&self) -> LinkStatus {
        match self.wifi.is_up() {
            Ok(true) => LinkStatus::Connected,
            Ok(false) => LinkStatus::Disconnected,
            Err(e) => {
                warn!("WiFi status unavailable: {}", e);
                LinkStatus::Disconnected
            }
        }
    }

    fn current_ssid(&self) -> Option<String> {
        if self.status() != LinkStatus::Connected {
            return None;
        }
        match self.wifi.get_configuration() {
            Ok(Configuration::Client(client)) => Some(client.ssid.to_string()),
            Ok(Configuration::Mixed(client, _)) => Some(client.ssid.to_string()),
            _ => None,
        }
    }

    fn current_signal_strength(&self) -> Option<i8> {
        let ssid = self.current_ssid()?;
        strongest_signal(&self.last_scan, &ssid)
    }
}
