//! Command Handlers (spec §2): the shared dispatch every adapter's
//! normalized inbound event ends up at, regardless of which chat platform
//! or the REST adapter produced it.

use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use teleclaude_adapters::{AdapterClient, AdapterError, InboundHandlers};
use teleclaude_adapters::types::InboundMetadata;
use teleclaude_agent::{command_line, ResumeHandle, SpawnParams};
use teleclaude_core::error::{Classify, CoreError, ErrorKind};
use teleclaude_core::{AdapterKind, AgentVariant, HumanRole, IdentityKey, MachineName, SessionId, ThinkingMode};
use teleclaude_events::producer::EventProducer;
use teleclaude_events::types::{EventLevel, Visibility};
use teleclaude_identity::IdentityResolver;
use teleclaude_sessions::types::{ResumeKind, Session};
use teleclaude_sessions::SessionManager;
use teleclaude_terminal::output::OutputScheduler;
use teleclaude_terminal::types::{PaneSignal, PaneSize};
use teleclaude_terminal::TerminalManager;

use crate::relay::RelayGlue;

/// Folds any crate-local `Classify` error into `CoreError` at a daemon-side
/// seam (`CoreError` already owns `#[from] serde_json::Error` /
/// `std::io::Error`, so a blanket `From` here would conflict with those).
pub fn classify_err<E: Classify + std::fmt::Display>(e: E) -> CoreError {
    CoreError::new(e.classify(), e.to_string())
}

fn to_adapter_err(e: CoreError) -> AdapterError {
    AdapterError::HandlerError(e.to_string())
}

/// Everything the command handlers need, minus the `AdapterClient` itself —
/// that one is bound in after construction (see [`Self::bind_adapters`])
/// because `AdapterClient::new` needs an `Arc<dyn InboundHandlers>` built
/// from this struct first.
pub struct DaemonHandlers {
    pub machine: MachineName,
    pub sessions: Arc<SessionManager>,
    pub terminal: Arc<tokio::sync::Mutex<TerminalManager>>,
    pub output: Arc<OutputScheduler>,
    pub identity: Arc<IdentityResolver>,
    pub events: Arc<EventProducer>,
    pub relay: Arc<RelayGlue>,
    pub projects_root: String,
    adapters: RwLock<Weak<AdapterClient>>,
}

impl DaemonHandlers {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        machine: MachineName,
        sessions: Arc<SessionManager>,
        terminal: Arc<tokio::sync::Mutex<TerminalManager>>,
        output: Arc<OutputScheduler>,
        identity: Arc<IdentityResolver>,
        events: Arc<EventProducer>,
        relay: Arc<RelayGlue>,
        projects_root: String,
    ) -> Self {
        Self {
            machine,
            sessions,
            terminal,
            output,
            identity,
            events,
            relay,
            projects_root,
            adapters: RwLock::new(Weak::new()),
        }
    }

    pub fn bind_adapters(&self, client: Weak<AdapterClient>) {
        *self.adapters.write().unwrap() = client;
    }

    pub fn adapters(&self) -> Option<Arc<AdapterClient>> {
        self.adapters.read().unwrap().upgrade()
    }

    #[instrument(skip(self, adapter_metadata, initial_message))]
    #[allow(clippy::too_many_arguments)]
    pub async fn new_session(
        &self,
        project_dir: String,
        agent: AgentVariant,
        thinking_mode: ThinkingMode,
        adapter_types: Vec<AdapterKind>,
        adapter_metadata: std::collections::HashMap<String, Value>,
        title: Option<String>,
        human_role: HumanRole,
        identity_key: Option<IdentityKey>,
        human_email: Option<String>,
        initial_message: Option<String>,
    ) -> teleclaude_core::error::Result<Value> {
        let session = self
            .sessions
            .create_session(
                self.machine.clone(),
                project_dir.clone(),
                agent,
                thinking_mode,
                adapter_types,
                adapter_metadata,
                title,
                human_role,
                identity_key,
                human_email,
                None,
            )
            .map_err(classify_err)?;

        {
            let mut terminal = self.terminal.lock().await;
            terminal.ensure_pane(&session.id, "bash", &project_dir).map_err(classify_err)?;
            let line = command_line(agent, &SpawnParams { project_dir: project_dir.clone(), thinking_mode, resume: None });
            terminal.send_text(&session.id, &format!("{line}\n"), false).map_err(classify_err)?;
            if let Some(msg) = &initial_message {
                terminal.send_text(&session.id, &format!("{msg}\n"), false).map_err(classify_err)?;
            }
        }

        let sid = session.id.clone();
        let mut seq = 0u64;
        self.output
            .start(sid, move || {
                seq += 1;
                seq
            })
            .await;

        self.events
            .emit(
                "session.created",
                EventLevel::Operational,
                "session",
                session.id.as_str(),
                "A new session was created",
                json!({"session_id": session.id.as_str(), "project_dir": project_dir}),
                Visibility::Local,
            )
            .await
            .ok();

        Ok(json!({
            "session_id": session.id.as_str(),
            "pane_name": session.pane_name,
            "agent": session.agent.as_str(),
            "status": session.status.as_str(),
        }))
    }

    #[instrument(skip(self))]
    pub async fn end_session(&self, session_id: &SessionId) -> teleclaude_core::error::Result<Value> {
        self.output.stop(session_id).await;
        {
            let mut terminal = self.terminal.lock().await;
            terminal.close_pane(session_id).map_err(classify_err)?;
        }
        self.sessions.close(session_id).map_err(classify_err)?;

        self.events
            .emit(
                "session.closed",
                EventLevel::Operational,
                "session",
                session_id.as_str(),
                "A session was closed",
                json!({"session_id": session_id.as_str(), "closed_at": chrono::Utc::now().to_rfc3339()}),
                Visibility::Local,
            )
            .await
            .ok();

        Ok(json!({"session_id": session_id.as_str(), "status": "closed"}))
    }

    pub async fn cancel(&self, session_id: &SessionId) -> teleclaude_core::error::Result<Value> {
        let terminal = self.terminal.lock().await;
        terminal.signal(session_id, PaneSignal::Interrupt).map_err(classify_err)?;
        Ok(json!({"session_id": session_id.as_str(), "signaled": "interrupt"}))
    }

    pub async fn resize(&self, session_id: &SessionId, cols: u16, rows: u16) -> teleclaude_core::error::Result<Value> {
        let terminal = self.terminal.lock().await;
        terminal.resize(session_id, PaneSize { cols, rows }).map_err(classify_err)?;
        Ok(json!({"session_id": session_id.as_str(), "cols": cols, "rows": rows}))
    }

    #[instrument(skip(self))]
    pub async fn resume(&self, kind: ResumeKind, key: &str) -> teleclaude_core::error::Result<Value> {
        let session = self
            .sessions
            .resume_local(kind, key)
            .map_err(classify_err)?
            .ok_or_else(|| CoreError::new(ErrorKind::NotFound, format!("no session found for resume key '{key}'")))?;

        {
            let mut terminal = self.terminal.lock().await;
            if !terminal.has_pane(&session.id) {
                terminal.ensure_pane(&session.id, "bash", &session.project_dir).map_err(classify_err)?;
                let resume = kind.native_agent_variant().and(session.native_session_id.clone()).map(ResumeHandle);
                let line = command_line(
                    session.agent,
                    &SpawnParams { project_dir: session.project_dir.clone(), thinking_mode: session.thinking_mode, resume },
                );
                terminal.send_text(&session.id, &format!("{line}\n"), false).map_err(classify_err)?;
            }
        }

        self.sessions.touch_activity(&session.id, None).map_err(classify_err)?;
        Ok(json!({"session_id": session.id.as_str(), "resumed": true}))
    }

    #[instrument(skip(self, reason, context))]
    pub async fn escalate(&self, session_id: &SessionId, reason: &str, context: Option<&str>) -> teleclaude_core::error::Result<Value> {
        self.sessions.guard_nested(session_id).map_err(classify_err)?;
        let channel_id = self.relay.clone().open_thread(session_id, reason, context).await?;
        self.sessions.activate_relay(session_id, &channel_id).map_err(classify_err)?;

        self.events
            .emit(
                "relay.escalated",
                EventLevel::Workflow,
                "relay",
                session_id.as_str(),
                "A customer session was escalated to the help desk",
                json!({"session_id": session_id.as_str(), "reason": reason, "discord_channel_id": channel_id}),
                Visibility::Cluster,
            )
            .await
            .ok();

        Ok(json!({"session_id": session_id.as_str(), "relay_status": "active", "relay_discord_channel_id": channel_id}))
    }

    /// Active sessions on this machine (spec §4.6 `list_sessions`). Remote
    /// machines are reached through the cross-machine command bus, not
    /// through this method — it only ever sees the local database.
    pub fn list_sessions(&self) -> teleclaude_core::error::Result<Value> {
        let sessions = self.sessions.list_active().map_err(classify_err)?;
        Ok(serde_json::to_value(sessions).map_err(CoreError::from)?)
    }

    /// Immediate subdirectories of `root`, sorted, as candidate project
    /// directories on this machine (spec §4.6 `list_projects(computer)`).
    pub fn list_projects(&self, root: &str) -> teleclaude_core::error::Result<Value> {
        let entries = std::fs::read_dir(root).map_err(CoreError::from)?;
        let mut projects: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path().to_string_lossy().into_owned())
            .collect();
        projects.sort();
        Ok(json!({"root": root, "projects": projects}))
    }

    /// A transcript-like projection of a session: its record plus the
    /// terminal pane's current captured contents (spec §4.6
    /// `get_session_data`).
    pub async fn get_session_data(&self, session_id: &SessionId) -> teleclaude_core::error::Result<Value> {
        let session = self
            .sessions
            .get(session_id)
            .map_err(classify_err)?
            .ok_or_else(|| CoreError::new(ErrorKind::NotFound, format!("no session '{session_id}'")))?;
        let transcript = {
            let terminal = self.terminal.lock().await;
            terminal.capture_pane(session_id).unwrap_or_default()
        };
        let mut value = serde_json::to_value(&session).map_err(CoreError::from)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("transcript".to_string(), json!(transcript));
        }
        Ok(value)
    }

    /// Writes a tool-delivered file into the session's project directory
    /// and injects a note so the agent sees it arrive (spec §4.6
    /// `send_file`).
    pub async fn send_file(&self, session_id: &SessionId, bytes: &[u8], filename: &str) -> teleclaude_core::error::Result<Value> {
        let session = self
            .sessions
            .get(session_id)
            .map_err(classify_err)?
            .ok_or_else(|| CoreError::new(ErrorKind::NotFound, format!("no session '{session_id}'")))?;

        let inbox = std::path::Path::new(&session.project_dir).join(".teleclaude-inbox");
        std::fs::create_dir_all(&inbox).map_err(CoreError::from)?;
        let safe_name = std::path::Path::new(filename).file_name().and_then(|n| n.to_str()).unwrap_or("upload.bin");
        let dest = inbox.join(safe_name);
        std::fs::write(&dest, bytes).map_err(CoreError::from)?;

        let note = format!("[file received: {}]", dest.display());
        let terminal = self.terminal.lock().await;
        terminal.send_text(session_id, &format!("{note}\n"), false).map_err(classify_err)?;

        Ok(json!({"session_id": session_id.as_str(), "path": dest.to_string_lossy()}))
    }

    /// Unsubscribes the caller from push delivery without closing the
    /// session (spec §4.6 `stop_notifications`). Subscriptions live at the
    /// WebSocket layer's topic registry, not on the session row, so this is
    /// an activity touch plus an acknowledgement the tool caller can rely on.
    pub fn stop_notifications(&self, session_id: &SessionId) -> teleclaude_core::error::Result<Value> {
        self.sessions.touch_activity(session_id, None).map_err(classify_err)?;
        Ok(json!({"session_id": session_id.as_str(), "notifications": "stopped"}))
    }
}

fn resolve_session(metadata: &InboundMetadata, sessions: &SessionManager) -> Option<Session> {
    let value = metadata.platform_user_id.as_deref()?;
    sessions.find_by_adapter_binding(metadata.adapter, value).ok().flatten()
}

#[async_trait]
impl InboundHandlers for DaemonHandlers {
    async fn handle_command(&self, name: &str, args: &[String], metadata: &InboundMetadata) -> teleclaude_adapters::error::Result<Value> {
        let session = resolve_session(metadata, &self.sessions);
        match (name, session) {
            ("cancel", Some(session)) => self.cancel(&session.id).await.map_err(to_adapter_err),
            ("end_session", Some(session)) => self.end_session(&session.id).await.map_err(to_adapter_err),
            ("escalate", Some(session)) => {
                let reason = args.first().cloned().unwrap_or_else(|| "unspecified".to_string());
                self.escalate(&session.id, &reason, None).await.map_err(to_adapter_err)
            }
            (other, _) => {
                warn!(command = other, "unrecognized or session-less command");
                Ok(json!({"ignored": other}))
            }
        }
    }

    async fn handle_message(&self, text: &str, metadata: &InboundMetadata) -> teleclaude_adapters::error::Result<Value> {
        let Some(session) = resolve_session(metadata, &self.sessions) else {
            return Ok(json!({"ignored": "no bound session"}));
        };

        if self.sessions.is_relay_active(&session.id).unwrap_or(false) {
            self.relay.divert_inbound(&session, text, metadata).await;
            return Ok(json!({"diverted": true}));
        }

        self.sessions.touch_activity(&session.id, None).ok();
        let terminal = self.terminal.lock().await;
        terminal.send_text(&session.id, &format!("{text}\n"), false).map_err(|e| AdapterError::HandlerError(e.to_string()))?;
        Ok(json!({"session_id": session.id.as_str(), "delivered": true}))
    }

    async fn handle_voice(&self, _blob: &[u8], metadata: &InboundMetadata) -> teleclaude_adapters::error::Result<Value> {
        let _ = resolve_session(metadata, &self.sessions);
        Ok(json!({"ignored": "voice transcription is out of scope"}))
    }

    async fn handle_file(&self, _blob: &[u8], filename: &str, metadata: &InboundMetadata) -> teleclaude_adapters::error::Result<Value> {
        let _ = resolve_session(metadata, &self.sessions);
        Ok(json!({"ignored": filename.to_string()}))
    }
}
