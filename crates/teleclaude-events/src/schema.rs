//! Event schema registry (spec §3/§4.8) — the static table cartridges
//! consult to build idempotency keys and decide which lifecycle transition
//! an incoming envelope drives.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::types::{EventLevel, EventSchema, Lifecycle, Visibility};

fn registry() -> &'static HashMap<&'static str, EventSchema> {
    static REGISTRY: OnceLock<HashMap<&'static str, EventSchema>> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

/// Look up the schema for a dotted event type. Unknown event types are not
/// a hard error at emission time — they pass through the cartridge chain
/// un-projected (no lifecycle means "pass-through", spec §4.8 case 1).
pub fn lookup(event_type: &str) -> Option<&'static EventSchema> {
    registry().get(event_type)
}

fn build_registry() -> HashMap<&'static str, EventSchema> {
    let mut m = HashMap::new();

    m.insert(
        "session.created",
        EventSchema {
            event_type: "session.created",
            description: "A new session was created",
            default_level: EventLevel::Operational,
            default_domain: "session",
            default_visibility: Visibility::Local,
            idempotency_fields: &["session_id"],
            lifecycle: Some(Lifecycle {
                creates: true,
                updates: false,
                resolves: false,
                group_key: Some("session_id".to_string()),
                meaningful_fields: vec![],
            }),
            actionable: false,
        },
    );

    m.insert(
        "session.closed",
        EventSchema {
            event_type: "session.closed",
            description: "A session was closed",
            default_level: EventLevel::Operational,
            default_domain: "session",
            default_visibility: Visibility::Local,
            idempotency_fields: &["session_id", "closed_at"],
            lifecycle: Some(Lifecycle {
                creates: false,
                updates: false,
                resolves: true,
                group_key: Some("session_id".to_string()),
                meaningful_fields: vec![],
            }),
            actionable: false,
        },
    );

    m.insert(
        "agent.needs_input",
        EventSchema {
            event_type: "agent.needs_input",
            description: "An agent is blocked waiting on human input",
            default_level: EventLevel::Workflow,
            default_domain: "agent",
            default_visibility: Visibility::Cluster,
            idempotency_fields: &["session_id", "prompt_hash"],
            lifecycle: Some(Lifecycle {
                creates: true,
                updates: true,
                resolves: false,
                group_key: Some("session_id".to_string()),
                meaningful_fields: vec!["prompt_hash".to_string()],
            }),
            actionable: true,
        },
    );

    m.insert(
        "agent.task_progress",
        EventSchema {
            event_type: "agent.task_progress",
            description: "Periodic progress update for a long-running agent task",
            default_level: EventLevel::Workflow,
            default_domain: "agent",
            default_visibility: Visibility::Cluster,
            idempotency_fields: &["session_id", "task_id"],
            lifecycle: Some(Lifecycle {
                creates: false,
                updates: true,
                resolves: false,
                group_key: Some("task_id".to_string()),
                meaningful_fields: vec![],
            }),
            actionable: false,
        },
    );

    m.insert(
        "agent.task_completed",
        EventSchema {
            event_type: "agent.task_completed",
            description: "A long-running agent task finished",
            default_level: EventLevel::Business,
            default_domain: "agent",
            default_visibility: Visibility::Cluster,
            idempotency_fields: &["session_id", "task_id"],
            lifecycle: Some(Lifecycle {
                creates: false,
                updates: false,
                resolves: true,
                group_key: Some("task_id".to_string()),
                meaningful_fields: vec![],
            }),
            actionable: false,
        },
    );

    m.insert(
        "relay.escalated",
        EventSchema {
            event_type: "relay.escalated",
            description: "A customer session escalated to a human relay",
            default_level: EventLevel::Business,
            default_domain: "relay",
            default_visibility: Visibility::Cluster,
            idempotency_fields: &["session_id"],
            lifecycle: Some(Lifecycle {
                creates: true,
                updates: false,
                resolves: false,
                group_key: Some("session_id".to_string()),
                meaningful_fields: vec![],
            }),
            actionable: true,
        },
    );

    m.insert(
        "mesh.peer_offline",
        EventSchema {
            event_type: "mesh.peer_offline",
            description: "A mesh peer's heartbeat expired",
            default_level: EventLevel::Infrastructure,
            default_domain: "mesh",
            default_visibility: Visibility::Local,
            idempotency_fields: &["machine_name"],
            lifecycle: None,
            actionable: false,
        },
    );

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_event_type_resolves() {
        assert!(lookup("session.created").is_some());
    }

    #[test]
    fn unknown_event_type_is_none() {
        assert!(lookup("nonexistent.event").is_none());
    }

    #[test]
    fn lifecycle_absent_means_pass_through() {
        let schema = lookup("mesh.peer_offline").unwrap();
        assert!(schema.lifecycle.is_none());
    }
}
