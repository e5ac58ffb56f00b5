//! The session data model (spec §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use teleclaude_core::{AdapterKind, AgentVariant, HumanRole, IdentityKey, MachineName, SessionId, ThinkingMode};

/// A session's place in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Closed,
    IdleCompacted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Closed => "closed",
            SessionStatus::IdleCompacted => "idle-compacted",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "closed" => Ok(SessionStatus::Closed),
            "idle-compacted" => Ok(SessionStatus::IdleCompacted),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// Help-Desk Relay diversion state (spec §4.7). `Active` always carries a
/// Discord channel id — see `Session`'s invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    Inactive,
    Active,
}

impl RelayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayStatus::Inactive => "inactive",
            RelayStatus::Active => "active",
        }
    }
}

impl std::fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelayStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(RelayStatus::Inactive),
            "active" => Ok(RelayStatus::Active),
            other => Err(format!("unknown relay status: {other}")),
        }
    }
}

/// The kind of key `SessionManager::resume` is given (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeKind {
    ByInternalId,
    ByNativeClaude,
    ByNativeGemini,
    ByNativeCodex,
}

impl ResumeKind {
    /// The agent variant a native-handle resume would spawn, if any.
    pub fn native_agent_variant(&self) -> Option<AgentVariant> {
        match self {
            ResumeKind::ByInternalId => None,
            ResumeKind::ByNativeClaude => Some(AgentVariant::Claude),
            ResumeKind::ByNativeGemini => Some(AgentVariant::Gemini),
            ResumeKind::ByNativeCodex => Some(AgentVariant::Codex),
        }
    }
}

/// A persisted session (spec §3).
///
/// Invariants enforced by `SessionManager`, not by this struct: exactly one
/// terminal pane per active session; `adapter_types` non-empty while active;
/// `relay_status == Active` implies `relay_discord_channel_id.is_some()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub machine: MachineName,
    pub pane_name: String,
    pub project_dir: String,
    pub agent: AgentVariant,
    pub thinking_mode: ThinkingMode,
    pub title: Option<String>,
    pub created_at: String,
    pub last_activity_at: String,
    pub last_output_summary: Option<String>,
    pub status: SessionStatus,
    pub adapter_types: Vec<AdapterKind>,
    /// Adapter identifier (its `as_str()`) to adapter-private JSON — e.g. a
    /// Telegram topic id or a Discord thread id.
    pub adapter_metadata: HashMap<String, Value>,
    pub initiator_session_id: Option<SessionId>,
    pub human_role: HumanRole,
    pub human_email: Option<String>,
    pub identity_key: Option<IdentityKey>,
    pub relay_status: RelayStatus,
    pub relay_discord_channel_id: Option<String>,
    pub relay_started_at: Option<String>,
    /// The agent CLI's own continuation handle, when it has returned one.
    pub native_session_id: Option<String>,
    pub last_memory_extraction_at: Option<String>,
    pub help_desk_processed_at: Option<String>,
}

impl Session {
    /// Whether this session currently satisfies the invariant that an
    /// active session carries at least one bound adapter.
    pub fn has_bound_adapters(&self) -> bool {
        !self.adapter_types.is_empty()
    }

    /// Whether the relay invariant (`Active` implies a channel id) holds.
    pub fn relay_invariant_holds(&self) -> bool {
        match self.relay_status {
            RelayStatus::Active => self.relay_discord_channel_id.is_some(),
            RelayStatus::Inactive => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_status_roundtrips() {
        for s in [SessionStatus::Active, SessionStatus::Closed, SessionStatus::IdleCompacted] {
            assert_eq!(s.to_string().parse::<SessionStatus>().unwrap(), s);
        }
    }

    #[test]
    fn resume_kind_maps_native_agent_variant() {
        assert_eq!(ResumeKind::ByNativeClaude.native_agent_variant(), Some(AgentVariant::Claude));
        assert_eq!(ResumeKind::ByInternalId.native_agent_variant(), None);
    }
}
