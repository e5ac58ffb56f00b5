//! `GET /computers` (spec §6) — the peer registry's view of the mesh.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use teleclaude_mesh::PeerStatus;

use crate::app::AppState;
use crate::error::ApiResult;

pub async fn list_computers(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let computers: Vec<Value> = state
        .mesh
        .registry
        .list()
        .into_iter()
        .map(|(peer, status)| {
            json!({
                "machine": peer.machine.as_str(),
                "user": peer.user,
                "host": peer.host,
                "status": if status == PeerStatus::Online { "online" } else { "offline" },
                "last_heartbeat": peer.last_heartbeat_wall,
            })
        })
        .collect();
    Ok(Json(json!({"computers": computers})))
}
