//! Operational HTTP endpoints.
//!
//! - `/healthz`    : liveness
//! - `/readyz`     : readiness (503 before the presence snapshot or while draining)
//! - `/metrics`    : Prometheus text format
//! - `/v1/markers` : markers of the last redraw
//! - `/v1/roster`  : online users, sorted

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::app_state::AgentState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readyz(State(state): State<AgentState>) -> impl IntoResponse {
    if state.metrics().is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else if !state.is_ready() {
        (StatusCode::SERVICE_UNAVAILABLE, "not synced")
    } else {
        (StatusCode::OK, "ready")
    }
}

pub async fn metrics(State(state): State<AgentState>) -> Response {
    let body = state.metrics().render();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

pub async fn markers(State(state): State<AgentState>) -> Response {
    let snap = state.snapshot();
    Json(json!({
        "channel": state.cfg().transport.channel,
        "viewport": snap.viewport,
        "markers": snap.markers,
    }))
    .into_response()
}

pub async fn roster(State(state): State<AgentState>) -> Response {
    let snap = state.snapshot();
    Json(json!({
        "count": snap.online.len(),
        "online": snap.online,
    }))
    .into_response()
}
