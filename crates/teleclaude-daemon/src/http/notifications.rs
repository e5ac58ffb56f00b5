//! The six `/api/notifications*` routes (spec §6, §4.8 state machine).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use teleclaude_core::error::{CoreError, ErrorKind};
use teleclaude_core::NotificationId;
use teleclaude_events::store::NotificationFilter;
use teleclaude_events::types::{AgentStatus, EventLevel, HumanStatus, Visibility};

use crate::app::AppState;
use crate::error::ApiResult;
use crate::handlers::classify_err;

fn not_found(id: &str) -> CoreError {
    CoreError::new(ErrorKind::NotFound, format!("no notification '{id}'"))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub level: Option<String>,
    pub domain: Option<String>,
    pub human_status: Option<String>,
    pub agent_status: Option<String>,
    pub visibility: Option<String>,
    pub since: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn list(State(state): State<Arc<AppState>>, Query(q): Query<ListQuery>) -> ApiResult<Json<Value>> {
    let filter = NotificationFilter {
        level: q.level.map(|s| s.parse::<EventLevel>()).transpose().map_err(|e| CoreError::new(ErrorKind::InvalidInput, e))?,
        domain: q.domain,
        human_status: q.human_status.map(|s| s.parse::<HumanStatus>()).transpose().map_err(|e| CoreError::new(ErrorKind::InvalidInput, e))?,
        agent_status: q.agent_status.map(|s| s.parse::<AgentStatus>()).transpose().map_err(|e| CoreError::new(ErrorKind::InvalidInput, e))?,
        visibility: q.visibility.map(|s| s.parse::<Visibility>()).transpose().map_err(|e| CoreError::new(ErrorKind::InvalidInput, e))?,
        since: q.since,
        limit: q.limit.unwrap_or(100),
        offset: q.offset.unwrap_or(0),
    };
    let rows = state.notifications.list_filtered(&filter).map_err(classify_err)?;
    Ok(Json(serde_json::to_value(rows).map_err(CoreError::from)?))
}

pub async fn get_one(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let nid = NotificationId(id.clone());
    let notification = state.notifications.get(&nid).map_err(classify_err)?.ok_or_else(|| not_found(&id))?;
    Ok(Json(serde_json::to_value(notification).map_err(CoreError::from)?))
}

#[derive(Debug, Deserialize)]
pub struct SeenQuery {
    #[serde(default)]
    pub unseen: bool,
}

pub async fn mark_seen(State(state): State<Arc<AppState>>, Path(id): Path<String>, Query(q): Query<SeenQuery>) -> ApiResult<Json<Value>> {
    let nid = NotificationId(id.clone());
    let now = chrono::Utc::now().to_rfc3339();
    if q.unseen {
        state.notifications.update_fields(
            &nid,
            &state.notifications.get(&nid).map_err(classify_err)?.ok_or_else(|| not_found(&id))?.description,
            &Value::Null,
            true,
            &now,
        ).map_err(classify_err)?;
    } else {
        state.notifications.mark_seen(&nid, &now).map_err(classify_err)?;
    }
    Ok(Json(json!({"id": id, "human_status": if q.unseen { "unseen" } else { "seen" }})))
}

#[derive(Debug, Deserialize)]
pub struct ClaimBody {
    pub agent_id: String,
}

pub async fn claim(State(state): State<Arc<AppState>>, Path(id): Path<String>, Json(body): Json<ClaimBody>) -> ApiResult<Json<Value>> {
    let nid = NotificationId(id.clone());
    let now = chrono::Utc::now().to_rfc3339();
    state.notifications.set_agent_status(&nid, AgentStatus::Claimed, Some(&body.agent_id), &now).map_err(classify_err)?;
    Ok(Json(json!({"id": id, "agent_status": "claimed", "agent_id": body.agent_id})))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusBody {
    pub status: AgentStatus,
    pub agent_id: Option<String>,
}

pub async fn set_status(State(state): State<Arc<AppState>>, Path(id): Path<String>, Json(body): Json<SetStatusBody>) -> ApiResult<Json<Value>> {
    let nid = NotificationId(id.clone());
    let now = chrono::Utc::now().to_rfc3339();
    state.notifications.set_agent_status(&nid, body.status, body.agent_id.as_deref(), &now).map_err(classify_err)?;
    Ok(Json(json!({"id": id, "agent_status": body.status.to_string()})))
}

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    pub summary: String,
    pub link: Option<String>,
    pub resolved_by: String,
}

pub async fn resolve(State(state): State<Arc<AppState>>, Path(id): Path<String>, Json(body): Json<ResolveBody>) -> ApiResult<Json<Value>> {
    let nid = NotificationId(id.clone());
    let now = chrono::Utc::now().to_rfc3339();
    let resolution = json!({"summary": body.summary, "link": body.link, "resolved_by": body.resolved_by});
    state.notifications.resolve(&nid, Some(&resolution), &now).map_err(classify_err)?;
    Ok(Json(json!({"id": id, "agent_status": "resolved"})))
}
