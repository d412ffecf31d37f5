//! ESP32 adapters for netkeep.
//!
//! This crate provides the platform side of the known-network manager:
//! - NVS-backed [`Persistence`](netkeep_core::Persistence)
//! - A [`Radio`](netkeep_core::Radio) over the ESP-IDF station interface
//! - `EspHttpServer` handlers for the management API
//!
//! # Example
//!
//! ```ignore
//! use netkeep_esp32::{nvs::NvsPersistence, wifi::EspRadio};
//!
//! let persistence = NvsPersistence::new(EspDefaultNvsPartition::take()?);
//! let radio = EspRadio::new(peripherals.modem, sysloop, Some(nvs))?;
//! ```

pub mod http;
pub mod nvs;
pub mod wifi;
