//! # netkeep-web
//!
//! HTTP management API for the known-network store.
//!
//! This crate provides:
//! - Saved network listing, add/update and delete endpoints
//! - On-demand reconnect and link status
//! - A health endpoint reporting uptime
//!
//! Every handler delegates to a [`NetworkService`]; blocking calls run on
//! tokio's blocking pool so a reconnect cycle never stalls the executor.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use netkeep_web::{create_router, ServerState};
//!
//! let state = ServerState::new(manager);
//! let app = create_router(state);
//!
//! let listener = TcpListener::bind("0.0.0.0:80").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod routes;

// Re-exports
pub use error::ApiError;
pub use routes::create_router;

use std::sync::Arc;
use std::time::{Duration, Instant};

use netkeep_core::NetworkService;

/// Shared state for all route handlers.
pub struct ServerState {
    service: Arc<dyn NetworkService>,
    started: Instant,
}

impl ServerState {
    /// Wrap `service`; uptime is measured from this call.
    pub fn new(service: Arc<dyn NetworkService>) -> AppState {
        Arc::new(Self {
            service,
            started: Instant::now(),
        })
    }

    pub fn service(&self) -> Arc<dyn NetworkService> {
        Arc::clone(&self.service)
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Type alias for shared state in Axum handlers.
pub type AppState = Arc<ServerState>;

/// Run a blocking service call off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("worker task failed: {}", e)))
}
