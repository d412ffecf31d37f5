mod file_store;
mod settings;
mod sim_radio;

use std::sync::Arc;

use netkeep_core::{
    CredentialStore, FallbackNetwork, NetworkManager, Orchestrator, SystemClock,
};
use netkeep_web::{create_router, ServerState};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use file_store::FilePersistence;
use settings::Settings;
use sim_radio::SimulatedRadio;

/// Networks tried when no saved network is in range.
const FALLBACK: &[FallbackNetwork] = &[
    FallbackNetwork::new("netkeep-setup", "netkeep-setup"),
    FallbackNetwork::new("OpenLab", ""),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,netkeep_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("netkeep starting...");

    let settings = Settings::from_env()?;
    tracing::debug!("Settings: {:?}", settings);

    let persistence = FilePersistence::new(&settings.data_dir)?;
    tracing::info!("Credentials stored under {}", persistence.root().display());

    let radio = match &settings.radio_file {
        Some(path) => SimulatedRadio::from_file(path)?,
        None => {
            tracing::warn!("NETKEEP_RADIO not set, simulated radio sees no networks");
            SimulatedRadio::silent()
        }
    };

    let manager = Arc::new(NetworkManager::new(
        CredentialStore::new(persistence, settings.store.clone()),
        Orchestrator::new(radio, SystemClock::new(), settings.orchestrator.clone()),
        FALLBACK,
    ));

    let boot = Arc::clone(&manager);
    let report = tokio::task::spawn_blocking(move || boot.boot()).await?;
    match &report.ssid {
        Some(ssid) if report.ok => {
            tracing::info!("Connected to '{}' ({} source)", ssid, report.source)
        }
        _ => tracing::warn!(
            "No network joined at boot: {}",
            report.message.as_deref().unwrap_or("unknown error")
        ),
    }

    let app = create_router(ServerState::new(manager)).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(settings.bind).await?;
    tracing::info!("Management API listening on http://{}", settings.bind);
    tracing::info!("   curl http://{}/api/wifi/networks", settings.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down...");
            }
        })
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
