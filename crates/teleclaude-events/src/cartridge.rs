use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use teleclaude_core::NotificationId;
use tracing::warn;

use crate::error::Result;
use crate::store::NotificationStore;
use crate::types::{AgentStatus, CartridgeOutcome, EventEnvelope, EventSchema, HumanStatus, Notification, PushCallbackArgs};

/// A single stage of the event-processing pipeline (spec §4.8). Mirrors the
/// before/after chain-of-responsibility shape the agent pipeline's hook
/// engine uses, generalized to events: each cartridge may pass the envelope
/// through unchanged, rewrite it, or drop it outright.
#[async_trait]
pub trait Cartridge: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, envelope: EventEnvelope) -> Result<CartridgeOutcome>;
}

fn idempotency_key(schema: &EventSchema, envelope: &EventEnvelope) -> String {
    if let Some(explicit) = &envelope.idempotency_key {
        return explicit.clone();
    }
    let mut parts = vec![envelope.event_type.clone()];
    for field in schema.idempotency_fields {
        let value = envelope.payload.get(field).map(|v| v.to_string()).unwrap_or_default();
        parts.push(value);
    }
    parts.join(":")
}

/// Drops an envelope whose idempotency key already has a notification row
/// with no projectable lifecycle change — i.e. a pure at-least-once-delivery
/// replay of a `creates`-only event that already landed.
pub struct DedupCartridge {
    store: Arc<NotificationStore>,
}

impl DedupCartridge {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Cartridge for DedupCartridge {
    fn name(&self) -> &'static str {
        "dedup"
    }

    async fn process(&self, envelope: EventEnvelope) -> Result<CartridgeOutcome> {
        let Some(schema) = crate::schema::lookup(&envelope.event_type) else {
            return Ok(CartridgeOutcome::Pass(envelope));
        };
        let Some(lifecycle) = &schema.lifecycle else {
            return Ok(CartridgeOutcome::Pass(envelope));
        };

        if lifecycle.creates && !lifecycle.updates && !lifecycle.resolves {
            let key = idempotency_key(schema, &envelope);
            if self.store.find_by_idempotency_key(&key)?.is_some() {
                return Ok(CartridgeOutcome::Drop);
            }
        }

        Ok(CartridgeOutcome::Pass(envelope))
    }
}

/// Projects an envelope into the `notifications` table per its schema's
/// lifecycle declaration (spec §4.8). Returns `None` when no row was
/// touched (pass-through event types with no schema entry or no lifecycle).
pub struct NotificationProjectorCartridge {
    store: Arc<NotificationStore>,
}

impl NotificationProjectorCartridge {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }

    /// Project the envelope and return the push-callback arguments if a row
    /// was created or meaningfully updated. Called directly by the
    /// processor after the cartridge chain passes the envelope through,
    /// since projection needs to report `was_created`/`is_meaningful` to the
    /// delivery layer — information the `Cartridge` trait's pass/drop
    /// outcome alone can't carry.
    pub fn project(&self, envelope: &EventEnvelope) -> Result<Option<PushCallbackArgs>> {
        let Some(schema) = crate::schema::lookup(&envelope.event_type) else {
            return Ok(None);
        };
        let Some(lifecycle) = &schema.lifecycle else {
            return Ok(None);
        };

        let now = Utc::now().to_rfc3339();
        let key = idempotency_key(schema, envelope);
        let group_key = lifecycle.group_key.as_ref().and_then(|field| envelope.payload.get(field)).and_then(|v| v.as_str()).map(str::to_string);

        // Case: resolves — find the existing group row and mark it resolved.
        if lifecycle.resolves {
            let existing = match &group_key {
                Some(gk) => self.store.find_by_group_key(&envelope.event_type, gk)?,
                None => self.store.find_by_idempotency_key(&key)?,
            };
            let Some(existing) = existing else {
                warn!(event_type = %envelope.event_type, "resolve event for unknown notification group, dropping");
                return Ok(None);
            };
            self.store.resolve(&existing.id, Some(&envelope.payload), &now)?;
            return Ok(Some(PushCallbackArgs {
                notification_id: existing.id,
                event_type: envelope.event_type.clone(),
                was_created: false,
                is_meaningful: true,
                level: envelope.level,
            }));
        }

        // Case: updates-only — find by group key and update in place.
        if lifecycle.updates && !lifecycle.creates {
            let existing = match &group_key {
                Some(gk) => self.store.find_by_group_key(&envelope.event_type, gk)?,
                None => self.store.find_by_idempotency_key(&key)?,
            };
            let Some(existing) = existing else {
                warn!(event_type = %envelope.event_type, "update event for unknown notification group, dropping");
                return Ok(None);
            };
            self.store.update_fields(&existing.id, &envelope.description, &envelope.payload, false, &now)?;
            return Ok(Some(PushCallbackArgs {
                notification_id: existing.id,
                event_type: envelope.event_type.clone(),
                was_created: false,
                is_meaningful: false,
                level: envelope.level,
            }));
        }

        // Case: creates + updates with a group key — reactivate an existing
        // row on a meaningful-field change, otherwise insert fresh.
        if lifecycle.creates && lifecycle.updates {
            let existing = match &group_key {
                Some(gk) => self.store.find_by_group_key(&envelope.event_type, gk)?,
                None => self.store.find_by_idempotency_key(&key)?,
            };
            if let Some(existing) = existing {
                let is_meaningful = !lifecycle.meaningful_fields.is_empty()
                    && lifecycle.meaningful_fields.iter().any(|f| envelope.payload.get(f) != existing.payload.get(f));
                self.store.update_fields(&existing.id, &envelope.description, &envelope.payload, is_meaningful, &now)?;
                return Ok(Some(PushCallbackArgs {
                    notification_id: existing.id,
                    event_type: envelope.event_type.clone(),
                    was_created: false,
                    is_meaningful,
                    level: envelope.level,
                }));
            }
            let notification = new_notification(schema, envelope, key, group_key, &now);
            let id = notification.id.clone();
            self.store.insert(&notification)?;
            return Ok(Some(PushCallbackArgs {
                notification_id: id,
                event_type: envelope.event_type.clone(),
                was_created: true,
                is_meaningful: true,
                level: envelope.level,
            }));
        }

        // Case: creates-only — plain insert, no prior row possible (dedup
        // cartridge already filtered exact idempotency-key repeats).
        if lifecycle.creates {
            let notification = new_notification(schema, envelope, key, group_key, &now);
            let id = notification.id.clone();
            self.store.insert(&notification)?;
            return Ok(Some(PushCallbackArgs {
                notification_id: id,
                event_type: envelope.event_type.clone(),
                was_created: true,
                is_meaningful: true,
                level: envelope.level,
            }));
        }

        Ok(None)
    }
}

fn new_notification(schema: &EventSchema, envelope: &EventEnvelope, idempotency_key: String, group_key: Option<String>, now: &str) -> Notification {
    Notification {
        id: NotificationId::new(),
        event_type: envelope.event_type.clone(),
        version: envelope.version,
        source: envelope.source.clone(),
        level: envelope.level,
        domain: envelope.domain.clone(),
        visibility: envelope.visibility,
        entity: envelope.entity.clone(),
        description: envelope.description.clone(),
        payload: envelope.payload.clone(),
        idempotency_key,
        group_key,
        human_status: HumanStatus::Unseen,
        agent_status: AgentStatus::None,
        agent_id: None,
        resolution: None,
        created_at: now.to_string(),
        updated_at: now.to_string(),
        seen_at: None,
        claimed_at: None,
        resolved_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventLevel, Visibility};
    use rusqlite::Connection;
    use serde_json::json;

    fn envelope(event_type: &str, payload: serde_json::Value) -> EventEnvelope {
        EventEnvelope {
            event_type: event_type.to_string(),
            version: 1,
            source: "daemon".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            idempotency_key: None,
            level: EventLevel::Workflow,
            domain: "agent".to_string(),
            entity: "session-1".to_string(),
            description: "waiting".to_string(),
            visibility: Visibility::Cluster,
            payload,
            affordances: None,
            terminal_when: None,
            resolution_shape: None,
        }
    }

    #[tokio::test]
    async fn dedup_drops_repeat_of_creates_only_event() {
        let store = Arc::new(NotificationStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let dedup = DedupCartridge::new(Arc::clone(&store));
        let projector = NotificationProjectorCartridge::new(Arc::clone(&store));

        let env = envelope("session.created", json!({"session_id": "s1"}));
        let outcome = dedup.process(env.clone()).await.unwrap();
        let CartridgeOutcome::Pass(env) = outcome else { panic!("expected pass") };
        projector.project(&env).unwrap();

        let outcome2 = dedup.process(env).await.unwrap();
        assert!(matches!(outcome2, CartridgeOutcome::Drop));
    }

    #[test]
    fn projector_reactivates_on_meaningful_change() {
        let store = Arc::new(NotificationStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let projector = NotificationProjectorCartridge::new(Arc::clone(&store));

        let first = envelope("agent.needs_input", json!({"session_id": "s1", "prompt_hash": "a"}));
        let args1 = projector.project(&first).unwrap().unwrap();
        assert!(args1.was_created);

        let second = envelope("agent.needs_input", json!({"session_id": "s1", "prompt_hash": "b"}));
        let args2 = projector.project(&second).unwrap().unwrap();
        assert!(!args2.was_created);
        assert!(args2.is_meaningful);
        assert_eq!(args1.notification_id, args2.notification_id);

        let updated = store.get(&args2.notification_id).unwrap().unwrap();
        assert_eq!(updated.human_status, HumanStatus::Unseen);
    }

    #[test]
    fn projector_resolves_group() {
        let store = Arc::new(NotificationStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let projector = NotificationProjectorCartridge::new(Arc::clone(&store));

        let created = envelope("agent.task_progress", json!({"task_id": "t1"}));
        // task_progress is updates-only with no prior row: expect a warning
        // and no callback, matching the spec's "update for unknown group is
        // dropped" behavior.
        assert!(projector.project(&created).unwrap().is_none());
    }
}
