//! Management API handlers for `EspHttpServer`.
//!
//! Mirrors the Linux routes: `/health` and `/api/wifi/{status,networks,reconnect}`.
//! The server must be created with `uri_match_wildcard: true` for slot deletes.

use std::num::IntErrorKind;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use embedded_svc::io::{Read, Write};
use esp_idf_svc::http::server::{EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::http::Method;
use log::{info, warn};
use netkeep_core::{CredentialError, ErrorCode, NetworkService, MAX_NETWORKS};
use serde::Deserialize;
use serde_json::{json, Value};

/// Largest accepted request body.
const MAX_BODY: usize = 512;

const HEADERS: &[(&str, &str)] = &[
    ("Content-Type", "application/json"),
    ("Cache-Control", "no-store"),
    ("Access-Control-Allow-Origin", "*"),
];

#[derive(Deserialize)]
struct AddNetworkRequest {
    ssid: String,
    #[serde(default)]
    password: String,
}

fn send_json(req: Request<&mut EspHttpConnection>, status: u16, body: &Value) -> Result<()> {
    let mut resp = req.into_response(status, None, HEADERS)?;
    resp.write_all(body.to_string().as_bytes())?;
    Ok(())
}

fn error_body(code: &str, message: &str) -> Value {
    json!({ "ok": false, "error": code, "message": message })
}

fn credential_error(err: &CredentialError) -> (u16, Value) {
    let status = match err {
        CredentialError::InvalidInput(_) => 400,
        CredentialError::OutOfRange(_) => 404,
        CredentialError::NoFreeSlots => 409,
        CredentialError::Store(_) => 500,
    };
    (status, error_body(err.code(), &err.to_string()))
}

fn read_body(req: &mut Request<&mut EspHttpConnection>) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut buf = [0u8; 128];
    loop {
        let n = req.read(&mut buf)?;
        if n == 0 {
            return Ok(body);
        }
        if body.len() + n > MAX_BODY {
            anyhow::bail!("request body exceeds {} bytes", MAX_BODY);
        }
        body.extend_from_slice(&buf[..n]);
    }
}

/// Register every management route on `server`.
pub fn register_handlers(
    server: &mut EspHttpServer<'static>,
    service: Arc<dyn NetworkService>,
) -> Result<()> {
    let started = Instant::now();
    server.fn_handler("/health", Method::Get, move |req| {
        let body = json!({
            "ok": true,
            "status": "ok",
            "ts_ms": started.elapsed().as_millis() as u64,
        });
        send_json(req, 200, &body)
    })?;

    let svc = Arc::clone(&service);
    server.fn_handler("/api/wifi/status", Method::Get, move |req| {
        send_json(req, 200, &serde_json::to_value(svc.link_status())?)
    })?;

    let svc = Arc::clone(&service);
    server.fn_handler("/api/wifi/networks", Method::Get, move |req| {
        let body = json!({
            "ok": true,
            "max": MAX_NETWORKS,
            "networks": svc.list_networks(),
        });
        send_json(req, 200, &body)
    })?;

    let svc = Arc::clone(&service);
    server.fn_handler("/api/wifi/networks", Method::Post, move |mut req| {
        let parsed = read_body(&mut req).and_then(|bytes| {
            serde_json::from_slice::<AddNetworkRequest>(&bytes).map_err(anyhow::Error::from)
        });
        let request = match parsed {
            Ok(request) => request,
            Err(e) => return send_json(req, 400, &error_body("invalid_input", &e.to_string())),
        };

        match svc.add_network(&request.ssid, &request.password) {
            Ok(report) => send_json(req, 200, &serde_json::to_value(report)?),
            Err(e) => {
                let (status, body) = credential_error(&e);
                send_json(req, status, &body)
            }
        }
    })?;

    let svc = Arc::clone(&service);
    server.fn_handler("/api/wifi/networks/*", Method::Delete, move |req| {
        let raw = req.uri().rsplit('/').next().unwrap_or_default().to_string();
        let slot = match raw.parse::<usize>() {
            Ok(slot) => slot,
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => {
                let message = format!("Slot {} out of range", raw);
                return send_json(req, 404, &error_body("out_of_range", &message));
            }
            Err(_) => {
                return send_json(req, 400, &error_body("invalid_input", "slot must be a number"))
            }
        };

        match svc.delete_network(slot) {
            Ok(report) => send_json(req, 200, &serde_json::to_value(report)?),
            Err(e) => {
                let (status, body) = credential_error(&e);
                send_json(req, status, &body)
            }
        }
    })?;

    let svc = Arc::clone(&service);
    server.fn_handler("/api/wifi/reconnect", Method::Post, move |req| {
        info!("Reconnect requested over HTTP");
        let report = svc.trigger_reconnect();
        let status = if report.ok { 200 } else { 503 };
        if !report.ok {
            warn!("Reconnect failed: {:?}", report.message);
        }
        send_json(req, status, &serde_json::to_value(report)?)
    })?;

    Ok(())
}
