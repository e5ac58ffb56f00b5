use serde::{Deserialize, Serialize};
use teleclaude_core::MachineName;

/// Wire payload published to the shared `heartbeat` stream every machine
/// both produces and consumes (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub machine_name: String,
    pub user: String,
    pub host: String,
    pub transport_binary_path: String,
    /// RFC3339 wall-clock timestamp the publisher stamped at send time.
    pub timestamp: String,
}

/// A remote machine observed by heartbeat, plus the local machine which is
/// always present (spec §3 Peer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub machine: MachineName,
    pub user: String,
    pub host: String,
    pub transport_binary_path: String,
    /// Monotonic instant of the last observed heartbeat, used to derive
    /// online/offline status against the TTL.
    #[serde(skip, default = "std::time::Instant::now")]
    pub last_heartbeat: std::time::Instant,
    /// Wall-clock timestamp of the last heartbeat, kept for "last seen N
    /// ago" UI even after the peer drops out of TTL.
    pub last_heartbeat_wall: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerStatus {
    Online,
    Offline,
}

impl Peer {
    pub fn status(&self, ttl: std::time::Duration) -> PeerStatus {
        if self.last_heartbeat.elapsed() < ttl {
            PeerStatus::Online
        } else {
            PeerStatus::Offline
        }
    }
}

/// One entry appended to a `commands:{machine}` stream (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub correlation_id: String,
    pub initiator_machine: String,
    pub initiator_session_id: Option<String>,
    /// Target session, if the operation addresses one directly.
    pub target_session_id: Option<String>,
    pub operation: String,
    pub arguments: serde_json::Value,
}

/// Published on the response stream once the target machine's consumer
/// has run the command through the same handlers used locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub correlation_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The Tool Server's operations surface (spec §4.6), named rather than
/// dispatched by raw string past this point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOperation {
    ListComputers,
    ListProjects,
    ListSessions,
    StartSession,
    SendMessage,
    SendFile,
    GetSessionData,
    EndSession,
    StopNotifications,
    Deploy,
    Escalate,
}

impl ToolOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolOperation::ListComputers => "list_computers",
            ToolOperation::ListProjects => "list_projects",
            ToolOperation::ListSessions => "list_sessions",
            ToolOperation::StartSession => "start_session",
            ToolOperation::SendMessage => "send_message",
            ToolOperation::SendFile => "send_file",
            ToolOperation::GetSessionData => "get_session_data",
            ToolOperation::EndSession => "end_session",
            ToolOperation::StopNotifications => "stop_notifications",
            ToolOperation::Deploy => "deploy",
            ToolOperation::Escalate => "escalate",
        }
    }

    pub const ALL: [ToolOperation; 11] = [
        ToolOperation::ListComputers,
        ToolOperation::ListProjects,
        ToolOperation::ListSessions,
        ToolOperation::StartSession,
        ToolOperation::SendMessage,
        ToolOperation::SendFile,
        ToolOperation::GetSessionData,
        ToolOperation::EndSession,
        ToolOperation::StopNotifications,
        ToolOperation::Deploy,
        ToolOperation::Escalate,
    ];
}

/// Length-prefixed tool-socket request (spec §4.6 "framed as
/// length-prefixed messages").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub operation: ToolOperation,
    #[serde(default)]
    pub arguments: serde_json::Value,
    /// The caller's session id, used to resolve `human_role` for the role
    /// gate (spec §4.6). `None` for a bare CLI caller, treated as `member`.
    #[serde(default)]
    pub caller_session_id: Option<String>,
}

/// Tool-socket response — wraps the same envelope shape as UCAP dispatch
/// (spec §4.6 "all return envelopes per §4.3").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub status: ToolResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolResponseStatus {
    Success,
    Error,
}

impl ToolResponse {
    pub fn success(id: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            id: id.into(),
            status: ToolResponseStatus::Success,
            data: Some(serde_json::to_value(data).unwrap_or(serde_json::Value::Null)),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ToolResponseStatus::Error,
            data: None,
            error: Some(message.into()),
        }
    }
}
