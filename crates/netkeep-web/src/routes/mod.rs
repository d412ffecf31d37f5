//! HTTP route handlers.
//!
//! Routes are organized as:
//! - `/health` - Liveness and uptime
//! - `/api/wifi/` - Saved networks, reconnect and link status
//!
//! All responses are JSON and carry `Cache-Control: no-store`.

pub mod health;
pub mod wifi;

use crate::{AppState, ApiError};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

/// Create the main Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/wifi", wifi::routes())
        .fallback(not_found)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors)
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}
