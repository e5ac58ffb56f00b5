//! Central shared state for the REST adapter (spec §6) plus the router
//! wiring every endpoint onto [`crate::handlers::DaemonHandlers`] and the
//! other already-assembled subsystems.

use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use teleclaude_adapters::AdapterClient;
use teleclaude_core::config::TeleClaudeConfig;
use teleclaude_events::{DeliveryHub, NotificationStore};
use teleclaude_identity::IdentityResolver;
use teleclaude_mesh::Mesh;
use teleclaude_scheduler::SchedulerHandle;
use teleclaude_sessions::SessionManager;
use teleclaude_terminal::TerminalManager;
use teleclaude_whatsapp::WhatsappAdapter;
use tokio::sync::broadcast;

use crate::handlers::DaemonHandlers;

/// Passed as `Arc<AppState>` to every Axum handler. Everything here is
/// already-constructed subsystem state; the daemon's `main.rs` is the only
/// place that assembles it.
pub struct AppState {
    pub config: TeleClaudeConfig,
    pub handlers: Arc<DaemonHandlers>,
    pub sessions: Arc<SessionManager>,
    pub terminal: Arc<tokio::sync::Mutex<TerminalManager>>,
    pub identity: Arc<IdentityResolver>,
    pub notifications: Arc<NotificationStore>,
    pub delivery: Arc<DeliveryHub>,
    pub mesh: Mesh,
    pub adapters: Arc<AdapterClient>,
    pub scheduler: Arc<SchedulerHandle>,
    /// `None` when no WhatsApp secrets are configured — the webhook routes
    /// then answer 404 rather than panicking.
    pub whatsapp: Option<Arc<WhatsappAdapter>>,
    /// Fan-out sender for the `notifications` WS topic; each connection
    /// subscribes its own receiver (spec §6 "subscription filter is
    /// enforced server-side").
    pub ws_notifications: broadcast::Sender<String>,
}

/// Assemble the full Axum router (spec §6 "selection" of REST endpoints,
/// plus the WhatsApp webhook route the adapter's architecture requires).
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sessions", get(crate::http::sessions::list_sessions))
        .route("/sessions", post(crate::http::sessions::create_session))
        .route("/sessions/{session_id}", delete(crate::http::sessions::end_session))
        .route("/sessions/{session_id}/message", post(crate::http::sessions::send_message))
        .route("/sessions/{session_id}/transcript", get(crate::http::sessions::transcript))
        .route("/computers", get(crate::http::computers::list_computers))
        .route("/projects", get(crate::http::projects::list_projects))
        .route("/projects/{path}/todos", get(crate::http::projects::project_todos))
        .route("/agents/availability", get(crate::http::agents::availability))
        .route("/api/notifications", get(crate::http::notifications::list))
        .route("/api/notifications/{id}", get(crate::http::notifications::get_one))
        .route("/api/notifications/{id}/seen", patch(crate::http::notifications::mark_seen))
        .route("/api/notifications/{id}/claim", post(crate::http::notifications::claim))
        .route("/api/notifications/{id}/status", patch(crate::http::notifications::set_status))
        .route("/api/notifications/{id}/resolve", post(crate::http::notifications::resolve))
        .route("/webhooks/whatsapp", get(crate::http::webhooks::whatsapp_verify))
        .route("/webhooks/whatsapp", post(crate::http::webhooks::whatsapp_receive))
        .route("/health", get(crate::http::health::health_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
