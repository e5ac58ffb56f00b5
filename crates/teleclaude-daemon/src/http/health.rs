//! `GET /health` — liveness probe.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use teleclaude_agent::availability_report;

use crate::app::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let agents: Vec<Value> = availability_report()
        .into_iter()
        .map(|(variant, available)| json!({"agent": variant.as_str(), "available": available}))
        .collect();
    let computers_online = state.mesh.registry.list().into_iter().filter(|(_, status)| *status == teleclaude_mesh::PeerStatus::Online).count();

    Json(json!({
        "status": "ok",
        "machine": state.mesh.cfg.machine_name,
        "agents": agents,
        "computers_online": computers_online,
    }))
}
