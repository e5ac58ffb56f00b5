//! Tool Server glue (spec §4.6): the daemon-side `ToolHandler` the mesh
//! crate's Unix-socket server dispatches role-gated AI-to-AI calls onto.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use teleclaude_agent::ALL_VARIANTS;
use teleclaude_core::error::{CoreError, ErrorKind};
use teleclaude_core::{AdapterKind, AgentVariant, HumanRole, SessionId, ThinkingMode};
use teleclaude_mesh::commands::CommandBus;
use teleclaude_mesh::tool_server::ToolHandler;
use teleclaude_mesh::{CommandEnvelope, CommandResponse, PeerRegistry, PeerStatus, ToolOperation, ToolRequest, ToolResponse, ToolResponseStatus};
use teleclaude_sessions::SessionManager;

use crate::handlers::DaemonHandlers;

pub struct DaemonToolHandler {
    handlers: Arc<DaemonHandlers>,
    sessions: Arc<SessionManager>,
    registry: Arc<PeerRegistry>,
    commands: Arc<CommandBus>,
}

impl DaemonToolHandler {
    pub fn new(handlers: Arc<DaemonHandlers>, sessions: Arc<SessionManager>, registry: Arc<PeerRegistry>, commands: Arc<CommandBus>) -> Self {
        Self { handlers, sessions, registry, commands }
    }

    fn is_local(&self, computer: &str) -> bool {
        computer.is_empty() || computer == self.handlers.machine.as_str()
    }

    /// Forwards a tool call targeting a remote machine over the command
    /// bus, reusing the same operation name the bus's `CommandHandler`
    /// dispatches on (spec §4.6 operations are cross-machine reachable
    /// through §4.5's transport).
    async fn forward(&self, computer: &str, operation: ToolOperation, arguments: Value, caller_session_id: Option<&str>) -> ToolResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        match self
            .commands
            .send(computer, operation.as_str(), None, caller_session_id.map(String::from), arguments)
            .await
        {
            Ok(response) if response.ok => ToolResponse::success(request_id, response.data.unwrap_or(Value::Null)),
            Ok(response) => ToolResponse::error(request_id, response.error.unwrap_or_else(|| "remote call failed".to_string())),
            Err(err) => ToolResponse::error(request_id, err.to_string()),
        }
    }

    async fn forward_result(&self, computer: &str, operation: ToolOperation, args: Value, caller: Option<&str>) -> teleclaude_core::error::Result<Value> {
        let response = self.forward(computer, operation, args, caller).await;
        match response.status {
            ToolResponseStatus::Success => Ok(response.data.unwrap_or(Value::Null)),
            ToolResponseStatus::Error => Err(CoreError::new(
                ErrorKind::TransientTransport,
                response.error.unwrap_or_else(|| "remote tool call failed".to_string()),
            )),
        }
    }

    async fn dispatch(&self, operation: ToolOperation, args: Value, caller: Option<&str>) -> teleclaude_core::error::Result<Value> {
        match operation {
            ToolOperation::ListComputers => {
                let computers: Vec<Value> = self
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
                Ok(json!({"computers": computers}))
            }
            ToolOperation::ListProjects => {
                let computer = args.get("computer").and_then(|v| v.as_str()).unwrap_or_default();
                if self.is_local(computer) {
                    let root = args.get("root").and_then(|v| v.as_str()).unwrap_or(&self.handlers.projects_root);
                    self.handlers.list_projects(root)
                } else {
                    self.forward_result(computer, ToolOperation::ListProjects, args, caller).await
                }
            }
            ToolOperation::ListSessions => {
                let computer = args.get("computer").and_then(|v| v.as_str()).unwrap_or_default();
                if self.is_local(computer) {
                    self.handlers.list_sessions()
                } else {
                    self.forward_result(computer, ToolOperation::ListSessions, args, caller).await
                }
            }
            ToolOperation::StartSession => {
                let computer = args.get("computer").and_then(|v| v.as_str()).unwrap_or_default();
                if !self.is_local(computer) {
                    return self.forward_result(computer, ToolOperation::StartSession, args, caller).await;
                }
                self.start_session_from_args(args).await
            }
            ToolOperation::SendMessage => {
                let session_id = SessionId::from(required_str(&args, "session_id")?);
                let text = required_str(&args, "text")?;
                if let Some(adapters) = self.handlers.adapters() {
                    adapters.send_message(&session_id, &text).await;
                }
                Ok(json!({"session_id": session_id.as_str(), "delivered": true}))
            }
            ToolOperation::SendFile => {
                let session_id = SessionId::from(required_str(&args, "session_id")?);
                let filename = required_str(&args, "filename")?;
                let bytes_b64 = required_str(&args, "bytes")?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(bytes_b64)
                    .map_err(|e| CoreError::new(ErrorKind::InvalidInput, format!("bytes must be base64: {e}")))?;
                self.handlers.send_file(&session_id, &bytes, &filename).await
            }
            ToolOperation::GetSessionData => {
                let session_id = SessionId::from(required_str(&args, "session_id")?);
                self.handlers.get_session_data(&session_id).await
            }
            ToolOperation::EndSession => {
                let session_id = SessionId::from(required_str(&args, "session_id")?);
                self.handlers.end_session(&session_id).await
            }
            ToolOperation::StopNotifications => {
                let session_id = SessionId::from(required_str(&args, "session_id")?);
                self.handlers.stop_notifications(&session_id)
            }
            ToolOperation::Deploy => {
                let computers: Vec<String> = args
                    .get("computers")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();
                let mut results = Vec::new();
                for computer in &computers {
                    if self.is_local(computer) {
                        results.push(json!({"computer": computer, "status": "acknowledged"}));
                    } else {
                        let resp = self.forward(computer, ToolOperation::Deploy, json!({}), caller).await;
                        let status = if resp.status == ToolResponseStatus::Success { "acknowledged" } else { "failed" };
                        results.push(json!({"computer": computer, "status": status}));
                    }
                }
                Ok(json!({"results": results}))
            }
            ToolOperation::Escalate => {
                let reason = required_str(&args, "reason")?;
                let context = args.get("context_summary").and_then(|v| v.as_str());
                let customer_name = args.get("customer_name").and_then(|v| v.as_str());
                let Some(session_id) = caller.map(|s| SessionId::from(s.to_string())) else {
                    return Err(CoreError::new(ErrorKind::InvalidInput, "escalate requires a caller session"));
                };
                let reason = match customer_name {
                    Some(name) => format!("{name}: {reason}"),
                    None => reason,
                };
                self.handlers.escalate(&session_id, &reason, context).await
            }
        }
    }

    async fn start_session_from_args(&self, args: Value) -> teleclaude_core::error::Result<Value> {
        let project_dir = required_str(&args, "project_dir")?;
        let agent: AgentVariant = args
            .get("agent")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(ALL_VARIANTS[0]);
        let thinking_mode: ThinkingMode = args
            .get("thinking_mode")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let title = args.get("title").and_then(|v| v.as_str()).map(String::from);
        let direct = args.get("direct").and_then(|v| v.as_bool()).unwrap_or(false);

        // `direct=true` is peer topology: no notification fan-out, no
        // listener subscriptions, so it is bound to the redis adapter kind
        // rather than the REST-facing one ordinary tool callers use.
        let adapter_types = if direct { vec![AdapterKind::Redis] } else { vec![AdapterKind::Rest] };

        self.handlers
            .new_session(project_dir, agent, thinking_mode, adapter_types, Default::default(), title, HumanRole::Member, None, None, None)
            .await
    }
}

#[async_trait]
impl ToolHandler for DaemonToolHandler {
    async fn resolve_role(&self, caller_session_id: Option<&str>) -> HumanRole {
        let Some(id) = caller_session_id else {
            return HumanRole::Member;
        };
        self.sessions
            .get(&SessionId::from(id.to_string()))
            .ok()
            .flatten()
            .map(|s| s.human_role)
            .unwrap_or(HumanRole::Member)
    }

    async fn execute(&self, request: ToolRequest) -> ToolResponse {
        let id = request.id.clone();
        let caller = request.caller_session_id.clone();
        match self.dispatch(request.operation, request.arguments, caller.as_deref()).await {
            Ok(value) => ToolResponse::success(id, value),
            Err(err) => ToolResponse::error(id, err.to_string()),
        }
    }
}

fn required_str(args: &Value, key: &str) -> teleclaude_core::error::Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| CoreError::new(ErrorKind::InvalidInput, format!("missing required argument '{key}'")))
}

/// Reused by the cross-machine `CommandHandler` so remote-originated tool
/// calls run through the exact same dispatch as local ones.
pub async fn handle_envelope(handler: &DaemonToolHandler, envelope: CommandEnvelope) -> CommandResponse {
    let Some(operation) = ToolOperation::ALL.iter().find(|op| op.as_str() == envelope.operation) else {
        return CommandResponse {
            correlation_id: envelope.correlation_id,
            ok: false,
            data: None,
            error: Some(format!("unknown operation '{}'", envelope.operation)),
        };
    };
    let result = handler.dispatch(*operation, envelope.arguments, envelope.initiator_session_id.as_deref()).await;
    match result {
        Ok(data) => CommandResponse { correlation_id: envelope.correlation_id, ok: true, data: Some(data), error: None },
        Err(err) => CommandResponse { correlation_id: envelope.correlation_id, ok: false, data: None, error: Some(err.to_string()) },
    }
}
