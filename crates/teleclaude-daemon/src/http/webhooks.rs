//! WhatsApp webhook routes. Not named in spec §6's endpoint "selection",
//! but structurally required by the adapter's architecture: WhatsApp has no
//! persistent connection, so the subscription handshake and every inbound
//! message arrive over HTTP instead (see `teleclaude-whatsapp::adapter`).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: String,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: String,
    #[serde(rename = "hub.challenge")]
    pub challenge: String,
}

pub async fn whatsapp_verify(State(state): State<Arc<AppState>>, Query(q): Query<VerifyQuery>) -> impl IntoResponse {
    let Some(adapter) = &state.whatsapp else {
        return (StatusCode::NOT_FOUND, String::new());
    };
    match adapter.verify_subscription(&q.mode, &q.verify_token, &q.challenge) {
        Some(challenge) => (StatusCode::OK, challenge),
        None => (StatusCode::FORBIDDEN, String::new()),
    }
}

pub async fn whatsapp_receive(State(state): State<Arc<AppState>>, headers: HeaderMap, body: axum::body::Bytes) -> impl IntoResponse {
    let Some(adapter) = &state.whatsapp else {
        return StatusCode::NOT_FOUND;
    };

    let signature = headers.get("X-Hub-Signature-256").and_then(|v| v.to_str().ok()).unwrap_or_default();
    if !adapter.verify_signature(&body, signature) {
        return StatusCode::FORBIDDEN;
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return StatusCode::BAD_REQUEST,
    };

    adapter.receive_webhook(&payload).await;
    StatusCode::OK
}
