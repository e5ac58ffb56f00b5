//! `GET /projects`, `GET /projects/{path}/todos` (spec §6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiResult;

pub async fn list_projects(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let root = state.config.projects_root.clone();
    let value = state.handlers.list_projects(&root)?;
    Ok(Json(value))
}

/// A project's TODO list is whatever `TODO.md`/`TODO` file sits at its
/// root — the daemon does not parse task syntax, it hands back lines.
pub async fn project_todos(Path(path): Path<String>) -> ApiResult<Json<Value>> {
    let project_dir = std::path::PathBuf::from(&path);
    let candidates = ["TODO.md", "TODO", "todo.md"];
    let todos = candidates
        .iter()
        .map(|name| project_dir.join(name))
        .find(|p| p.is_file())
        .and_then(|p| std::fs::read_to_string(p).ok())
        .map(|contents| contents.lines().map(str::to_string).collect::<Vec<_>>())
        .unwrap_or_default();
    Ok(Json(json!({"path": path, "todos": todos})))
}
