use std::sync::{Arc, Mutex};

use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use teleclaude_core::config::MeshConfig;
use uuid::Uuid;

use crate::error::{EventsError, Result};
use crate::types::{EventEnvelope, EventLevel, Visibility};

pub const EVENTS_STREAM_KEY: &str = "events";

/// Publishes envelopes onto the shared `events` stream (spec §3). Every
/// machine in the mesh runs exactly one `EventProcessor` consumer against
/// this stream, so emission is a single `xadd_maxlen` — no per-target
/// routing the way `teleclaude-mesh`'s command bus needs.
pub struct EventProducer {
    conn: Mutex<ConnectionManager>,
    cfg: Arc<MeshConfig>,
}

impl EventProducer {
    pub fn new(conn: ConnectionManager, cfg: Arc<MeshConfig>) -> Self {
        Self { conn: Mutex::new(conn), cfg }
    }

    /// Build an envelope from its semantic fields, defaulting `version`,
    /// `timestamp` and `source` the way every call site otherwise would
    /// have to repeat, then publish it.
    pub async fn emit(&self, event_type: &str, level: EventLevel, domain: &str, entity: &str, description: &str, payload: Value, visibility: Visibility) -> Result<()> {
        let envelope = EventEnvelope {
            event_type: event_type.to_string(),
            version: 1,
            source: self.cfg.machine_name.clone(),
            timestamp: Utc::now().to_rfc3339(),
            idempotency_key: None,
            level,
            domain: domain.to_string(),
            entity: entity.to_string(),
            description: description.to_string(),
            visibility,
            payload,
            affordances: None,
            terminal_when: None,
            resolution_shape: None,
        };
        self.emit_envelope(envelope).await
    }

    /// Publish a fully-built envelope as-is (used when a caller already
    /// has affordances/resolution_shape to attach).
    pub async fn emit_envelope(&self, envelope: EventEnvelope) -> Result<()> {
        let body = serde_json::to_string(&envelope).map_err(|e| EventsError::Serialization(e.to_string()))?;
        let mut conn = self.conn.lock().unwrap().clone();
        let id: String = Uuid::new_v4().to_string();
        let _: String = conn
            .xadd_maxlen(EVENTS_STREAM_KEY, redis::streams::StreamMaxlen::Approx(self.cfg.stream_maxlen), "*", &[("payload", body), ("emit_id", id)])
            .await?;
        Ok(())
    }
}
