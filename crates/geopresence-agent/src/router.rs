//! Axum router wiring for the ops endpoints.

use axum::{routing::get, Router};

use crate::{app_state::AgentState, ops};

pub fn build_router(state: AgentState) -> Router {
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .route("/v1/markers", get(ops::markers))
        .route("/v1/roster", get(ops::roster))
        .with_state(state)
}
