//! `GET /agents/availability` (spec §6).

use axum::Json;
use serde_json::{json, Value};
use teleclaude_agent::availability_report;

pub async fn availability() -> Json<Value> {
    let report: Vec<Value> = availability_report()
        .into_iter()
        .map(|(variant, available)| json!({"agent": variant.as_str(), "available": available}))
        .collect();
    Json(json!({"agents": report}))
}
