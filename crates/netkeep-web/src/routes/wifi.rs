//! Saved network management endpoints.
//!
//! ### `GET /api/wifi/networks`
//!
//! ```json
//! { "ok": true, "max": 10, "networks": [ { "slot": 1, "filled": true, "ssid": "HomeNet" }, ... ] }
//! ```
//!
//! ### `POST /api/wifi/networks`
//!
//! Body `{ "ssid": "HomeNet", "password": "secret" }`. An existing SSID has its
//! password replaced in place; otherwise the lowest empty slot is used.
//!
//! ### `DELETE /api/wifi/networks/:slot`
//!
//! Slots are 1-based. Deleting an empty slot succeeds with `removed: false`.
//!
//! ### `POST /api/wifi/reconnect`
//!
//! Runs a full saved-then-fallback cycle and answers when it finishes:
//! 200 on success, 503 when nothing could be joined.
//!
//! ### `GET /api/wifi/status`
//!
//! Current association. Reports `busy: true` while a cycle is running.

use std::num::IntErrorKind;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use netkeep_core::{AddReport, DeleteReport, LinkReport, ReconnectReport, MAX_NETWORKS};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{run_blocking, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/networks", get(list_networks).post(add_network))
        .route("/networks/:slot", delete(delete_network))
        .route("/reconnect", post(reconnect))
}

#[derive(Debug, Deserialize)]
pub struct AddNetworkRequest {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

async fn status(State(state): State<AppState>) -> Json<LinkReport> {
    Json(state.service().link_status())
}

async fn list_networks(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let service = state.service();
    let networks = run_blocking(move || service.list_networks()).await?;
    Ok(Json(json!({
        "ok": true,
        "max": MAX_NETWORKS,
        "networks": networks,
    })))
}

async fn add_network(
    State(state): State<AppState>,
    payload: Result<Json<AddNetworkRequest>, JsonRejection>,
) -> Result<Json<AddReport>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    debug!("Add network request for '{}'", request.ssid);

    let service = state.service();
    let report = run_blocking(move || service.add_network(&request.ssid, &request.password))
        .await??;
    Ok(Json(report))
}

/// Parse a slot path segment. Numbers too large for `usize` are out of range
/// like any other slot past the table, not malformed.
fn parse_slot(raw: &str) -> Result<usize, ApiError> {
    raw.parse::<usize>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => ApiError::new(
            StatusCode::NOT_FOUND,
            "out_of_range",
            format!("Slot {} out of range", raw),
        ),
        _ => ApiError::bad_request(format!("invalid slot '{}'", raw)),
    })
}

async fn delete_network(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<DeleteReport>, ApiError> {
    let slot = parse_slot(&raw)?;

    let service = state.service();
    let report = run_blocking(move || service.delete_network(slot)).await??;
    Ok(Json(report))
}

async fn reconnect(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ReconnectReport>), ApiError> {
    info!("Reconnect requested over HTTP");
    let service = state.service();
    let report = run_blocking(move || service.trigger_reconnect()).await?;

    let status = if report.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((status, Json(report)))
}
