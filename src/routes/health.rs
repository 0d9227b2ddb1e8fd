//! Liveness endpoint
//!
//! `GET /health` returns 200 while the process is serving, along with the
//! backends it was wired to. It does not probe them.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub mode: &'static str,
    pub backends: Backends,
}

/// Backend implementations in use
#[derive(Serialize)]
pub struct Backends {
    pub store: &'static str,
    pub queue: &'static str,
    pub search: &'static str,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        mode: if state.args.dev_mode { "development" } else { "production" },
        backends: Backends {
            store: state.controller.store().backend(),
            queue: state.controller.publisher().backend(),
            search: state.search_backend,
        },
    }
}

/// Handle liveness probe (`/health`)
pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(&build_health_response(state))
        .unwrap_or_else(|_| r#"{"healthy":true,"error":"Serialization failed"}"#.to_string());

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
