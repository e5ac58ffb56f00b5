//! `GET/POST /sessions`, `DELETE /sessions/{id}`, `POST /sessions/{id}/message`,
//! `GET /sessions/{id}/transcript` (spec §6).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use teleclaude_core::{AdapterKind, AgentVariant, HumanRole, MachineName, SessionId, ThinkingMode};

use crate::app::AppState;
use crate::error::ApiResult;
use crate::handlers::classify_err;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub computer: Option<String>,
}

pub async fn list_sessions(State(state): State<Arc<AppState>>, Query(q): Query<ListQuery>) -> ApiResult<Json<Value>> {
    let sessions = match q.computer {
        Some(computer) => state.sessions.list_for_machine(&MachineName::from(computer)).map_err(classify_err)?,
        None => state.sessions.list_active().map_err(classify_err)?,
    };
    Ok(Json(serde_json::to_value(sessions).map_err(teleclaude_core::error::CoreError::from)?))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    #[allow(dead_code)]
    pub computer: Option<String>,
    pub project_dir: String,
    pub agent: AgentVariant,
    #[serde(default)]
    pub thinking_mode: ThinkingMode,
    pub title: Option<String>,
    pub message: Option<String>,
}

pub async fn create_session(State(state): State<Arc<AppState>>, Json(body): Json<CreateSessionBody>) -> ApiResult<Json<Value>> {
    let value = state
        .handlers
        .new_session(
            body.project_dir,
            body.agent,
            body.thinking_mode,
            vec![AdapterKind::Rest],
            Default::default(),
            body.title,
            HumanRole::Member,
            None,
            None,
            body.message,
        )
        .await?;
    Ok(Json(value))
}

#[derive(Debug, Deserialize)]
pub struct EndQuery {
    #[allow(dead_code)]
    pub computer: Option<String>,
}

pub async fn end_session(State(state): State<Arc<AppState>>, Path(session_id): Path<String>, Query(_q): Query<EndQuery>) -> ApiResult<Json<Value>> {
    let value = state.handlers.end_session(&SessionId::from(session_id)).await?;
    Ok(Json(value))
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub text: String,
}

pub async fn send_message(State(state): State<Arc<AppState>>, Path(session_id): Path<String>, Json(body): Json<MessageBody>) -> ApiResult<Json<Value>> {
    let session_id = SessionId::from(session_id);
    state.adapters.send_message(&session_id, &body.text).await;
    Ok(Json(serde_json::json!({"session_id": session_id.as_str(), "delivered": true})))
}

pub async fn transcript(State(state): State<Arc<AppState>>, Path(session_id): Path<String>) -> ApiResult<Json<Value>> {
    let value = state.handlers.get_session_data(&SessionId::from(session_id)).await?;
    Ok(Json(value))
}
