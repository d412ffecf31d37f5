//! # netkeep-core
//!
//! Known-network persistence and connection orchestration.
//!
//! This crate provides:
//! - The slot-based credential store and its compact binary encoding
//! - Persistence, radio and clock abstractions implemented per platform
//! - The scan → rank → connect state machine with saved/fallback passes
//! - The `NetworkService` management interface used by HTTP front ends
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux (tokio) and ESP32 (esp-idf) targets.

pub mod clock;
pub mod config;
pub mod credentials;
pub mod manager;
pub mod orchestrator;
pub mod persistence;
pub mod radio;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use clock::{Clock, SystemClock};
pub use config::{FallbackNetwork, OrchestratorConfig, StoreConfig};
pub use credentials::{
    Credential, CredentialError, CredentialStore, CredentialTable, DeleteOutcome, SlotInfo,
    SlotOutcome, MAX_NETWORKS,
};
pub use manager::{
    AddReport, DeleteReport, ErrorCode, LinkReport, NetworkManager, NetworkService,
    ReconnectReport,
};
pub use orchestrator::{
    Candidate, ConnectError, ConnectOutcome, CredentialSource, Orchestrator, PassResult,
};
pub use persistence::{copy_prefix, MemoryPersistence, Persistence, PersistenceSession, StoreError};
pub use radio::{strongest_signal, LinkStatus, Radio, RadioError, ScanResult};
