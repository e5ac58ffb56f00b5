use serde::{Deserialize, Serialize};
use serde_json::Value;
use teleclaude_core::NotificationId;

/// Semantic level of an event — also the chat-delivery filter threshold
/// (spec §4.8 "chat-platform delivery adapter filters by level ≥ workflow").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EventLevel {
    Infrastructure = 0,
    Operational = 1,
    Workflow = 2,
    Business = 3,
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventLevel::Infrastructure => "infrastructure",
            EventLevel::Operational => "operational",
            EventLevel::Workflow => "workflow",
            EventLevel::Business => "business",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for EventLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "infrastructure" => Ok(Self::Infrastructure),
            "operational" => Ok(Self::Operational),
            "workflow" => Ok(Self::Workflow),
            "business" => Ok(Self::Business),
            other => Err(format!("unknown event level: {other}")),
        }
    }
}

/// How widely an event may be shown (spec §3 Event Envelope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Local,
    Cluster,
    Public,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Visibility::Local => "local",
            Visibility::Cluster => "cluster",
            Visibility::Public => "public",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "cluster" => Ok(Self::Cluster),
            "public" => Ok(Self::Public),
            other => Err(format!("unknown visibility: {other}")),
        }
    }
}

/// An action an envelope's affordances may describe (spec §3 "structural
/// only, not executed in the core").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Affordance {
    pub description: String,
    pub produces_event_type: String,
    pub outcome_shape: Value,
}

/// Five-layer event envelope (spec §3). Wire form is the same struct,
/// serialized to JSON and carried as a single stream-entry field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    // -- Identity --
    pub event_type: String,
    pub version: u32,
    pub source: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,

    // -- Semantic --
    pub level: EventLevel,
    pub domain: String,
    pub entity: String,
    pub description: String,
    pub visibility: Visibility,

    // -- Data --
    pub payload: Value,

    // -- Affordances --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affordances: Option<std::collections::HashMap<String, Affordance>>,

    // -- Resolution --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_shape: Option<Value>,
}

/// Lifecycle declaration of an event type's schema entry (spec §3 Event
/// Schema): which of the `creates` / `updates` / `resolves` transitions a
/// matching envelope can drive, and which payload fields are `meaningful`
/// (a change resets `human_status` to unseen) versus silent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lifecycle {
    pub creates: bool,
    pub updates: bool,
    pub resolves: bool,
    /// Payload field whose value identifies "the same underlying thing"
    /// across a create and its subsequent updates/resolves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    /// Payload fields whose change resets `human_status` to `unseen`.
    #[serde(default)]
    pub meaningful_fields: Vec<String>,
}

/// Event schema registry entry (spec §3).
#[derive(Debug, Clone)]
pub struct EventSchema {
    pub event_type: &'static str,
    pub description: &'static str,
    pub default_level: EventLevel,
    pub default_domain: &'static str,
    pub default_visibility: Visibility,
    /// Ordered list of payload fields composing the dedup idempotency key.
    pub idempotency_fields: &'static [&'static str],
    pub lifecycle: Option<Lifecycle>,
    pub actionable: bool,
}

/// Human-visibility axis of a notification (spec §3), independent of
/// `AgentStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanStatus {
    Unseen,
    Seen,
}

impl std::fmt::Display for HumanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            HumanStatus::Unseen => "unseen",
            HumanStatus::Seen => "seen",
        })
    }
}

impl std::str::FromStr for HumanStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unseen" => Ok(Self::Unseen),
            "seen" => Ok(Self::Seen),
            other => Err(format!("unknown human_status: {other}")),
        }
    }
}

/// Agent-workflow axis of a notification (spec §3), independent of
/// `HumanStatus`. `claimed_at` is set only on `None -> Claimed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    None,
    Claimed,
    InProgress,
    Resolved,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AgentStatus::None => "none",
            AgentStatus::Claimed => "claimed",
            AgentStatus::InProgress => "in_progress",
            AgentStatus::Resolved => "resolved",
        })
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "claimed" => Ok(Self::Claimed),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!("unknown agent_status: {other}")),
        }
    }
}

/// Row derived by the notification projector cartridge (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub event_type: String,
    pub version: u32,
    pub source: String,
    pub level: EventLevel,
    pub domain: String,
    pub visibility: Visibility,
    pub entity: String,
    pub description: String,
    pub payload: Value,
    pub idempotency_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    pub human_status: HumanStatus,
    pub agent_status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
}

/// Outcome of running a single cartridge against an envelope (spec §4.8).
pub enum CartridgeOutcome {
    /// Pass the (possibly modified) envelope to the next cartridge.
    Pass(EventEnvelope),
    /// Drop the envelope — processing stops here, the entry is still ACKed.
    Drop,
}

/// Argument bundle handed to every registered push callback after
/// projection (spec §4.8 "invoke push callbacks with (notification_id,
/// event_type, was_created, is_meaningful, level)").
#[derive(Debug, Clone)]
pub struct PushCallbackArgs {
    pub notification_id: NotificationId,
    pub event_type: String,
    pub was_created: bool,
    pub is_meaningful: bool,
    pub level: EventLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_level_orders_by_severity() {
        assert!(EventLevel::Workflow > EventLevel::Operational);
        assert!(EventLevel::Business > EventLevel::Workflow);
    }

    #[test]
    fn human_status_round_trips_through_string() {
        assert_eq!("seen".parse::<HumanStatus>().unwrap(), HumanStatus::Seen);
        assert_eq!(HumanStatus::Unseen.to_string(), "unseen");
    }

    #[test]
    fn agent_status_round_trips_through_string() {
        assert_eq!("in_progress".parse::<AgentStatus>().unwrap(), AgentStatus::InProgress);
        assert_eq!(AgentStatus::Resolved.to_string(), "resolved");
    }
}
