//! Liveness endpoint.
//!
//! ### `GET /health`
//!
//! ```json
//! { "ok": true, "status": "ok", "ts_ms": 123456 }
//! ```
//!
//! `ts_ms` is milliseconds since the server state was created.

use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "status": "ok",
        "ts_ms": state.uptime().as_millis() as u64,
    }))
}
