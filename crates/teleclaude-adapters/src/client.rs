use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::future::join_all;
use teleclaude_core::SessionId;
use teleclaude_sessions::SessionManager;
use tracing::{debug, warn};

use crate::adapter::Adapter;
use crate::error::{AdapterError, Result};
use crate::handlers::InboundHandlers;
use crate::types::{DispatchEnvelope, InboundEvent};

/// Dedup window for repeated `(session_id, origin message id)` pairs
/// reaching UCAP from more than one adapter (spec §4.3).
const DEDUP_WINDOW: Duration = Duration::from_secs(10);

/// The single fan-in/fan-out boundary every inbound user event crosses in,
/// and every outbound agent message crosses out (spec §4.3 UCAP).
///
/// Owns adapter instances, dispatches normalized inbound events to the
/// shared [`InboundHandlers`] set, and broadcasts outbound text to every
/// adapter bound to a session.
pub struct AdapterClient {
    adapters: HashMap<&'static str, Arc<dyn Adapter>>,
    handlers: Arc<dyn InboundHandlers>,
    sessions: Arc<SessionManager>,
    dedup: DashMap<(String, String), Instant>,
    /// Feedback/notice message ids tracked per session so the next
    /// substantive `send_message` can delete them first (spec §4.3).
    transient: DashMap<String, Vec<(&'static str, String)>>,
}

impl AdapterClient {
    pub fn new(handlers: Arc<dyn InboundHandlers>, sessions: Arc<SessionManager>) -> Self {
        Self {
            adapters: HashMap::new(),
            handlers,
            sessions,
            dedup: DashMap::new(),
            transient: DashMap::new(),
        }
    }

    /// Register an adapter instance under its own `name()`. Intended to be
    /// called once per adapter at daemon startup, before `start_all`.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(adapter.name(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Adapter>> {
        self.adapters.get(name)
    }

    pub async fn start_all(&self) {
        for (name, adapter) in &self.adapters {
            if let Err(e) = adapter.start().await {
                warn!(adapter = %name, error = %e, "adapter failed to start");
            }
        }
    }

    pub async fn stop_all(&self) {
        for (name, adapter) in &self.adapters {
            if let Err(e) = adapter.stop().await {
                warn!(adapter = %name, error = %e, "adapter failed to stop cleanly");
            }
        }
    }

    /// The mandatory dispatch boundary (spec §4.3): every inbound event,
    /// whatever adapter it arrived on, is routed through here and the
    /// caller must unwrap the returned envelope rather than inspect a raw
    /// `data` shape.
    pub async fn handle_event(&self, session_id: &SessionId, event: InboundEvent) -> DispatchEnvelope {
        let metadata = event.metadata().clone();
        if let Some(origin) = &metadata.origin_message_id {
            if self.is_duplicate(session_id, origin) {
                debug!(session_id = %session_id, origin, "dropping duplicate inbound event");
                return DispatchEnvelope::success_empty();
            }
        }

        let result = match event {
            InboundEvent::Command { name, args, metadata } => {
                self.handlers.handle_command(&name, &args, &metadata).await
            }
            InboundEvent::Message { text, metadata } => self.handlers.handle_message(&text, &metadata).await,
            InboundEvent::Voice { blob, metadata } => self.handlers.handle_voice(&blob, &metadata).await,
            InboundEvent::File { blob, filename, metadata } => {
                self.handlers.handle_file(&blob, &filename, &metadata).await
            }
        };

        match result {
            Ok(data) => DispatchEnvelope::success(data),
            Err(e) => DispatchEnvelope::error(e.to_string()),
        }
    }

    fn is_duplicate(&self, session_id: &SessionId, origin_message_id: &str) -> bool {
        let key = (session_id.to_string(), origin_message_id.to_string());
        let now = Instant::now();
        self.dedup.retain(|_, seen_at| now.duration_since(*seen_at) < DEDUP_WINDOW);
        if self.dedup.contains_key(&key) {
            return true;
        }
        self.dedup.insert(key, now);
        false
    }

    /// Outbound broadcast (spec §4.3): look up the session, fan out to
    /// every bound adapter in parallel, and never let one adapter's
    /// failure affect another's. Silently drops (with a log) if the
    /// session is absent or closed.
    pub async fn send_message(&self, session_id: &SessionId, text: &str) {
        let session = match self.sessions.get(session_id) {
            Ok(Some(s)) if s.status == teleclaude_sessions::SessionStatus::Active => s,
            Ok(_) => {
                debug!(session_id = %session_id, "send_message: session absent or closed, dropping");
                return;
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "send_message: session lookup failed, dropping");
                return;
            }
        };

        self.flush_transient(session_id).await;

        let metadata = serde_json::to_value(&session.adapter_metadata).unwrap_or(serde_json::Value::Null);
        let sends = session.adapter_types.iter().filter_map(|kind| {
            let adapter = self.adapters.get(kind.as_str())?;
            let adapter = Arc::clone(adapter);
            let text = text.to_string();
            let metadata = metadata.clone();
            let session_id = session_id.clone();
            Some(async move {
                match adapter.send_message(&session_id, &text, &metadata).await {
                    Ok(_) => {}
                    Err(e) => warn!(adapter = adapter.name(), session_id = %session_id, error = %e, "outbound send failed"),
                }
            })
        });

        join_all(sends).await;
    }

    /// Outbound terminal-output delta (spec §4.2 dual-mode rendering):
    /// same fan-out as `send_message`, but each adapter receives the form
    /// its `output_form()` asks for rather than a single shared string.
    pub async fn send_delta(&self, session_id: &SessionId, human: &str, agent: &str) {
        let session = match self.sessions.get(session_id) {
            Ok(Some(s)) if s.status == teleclaude_sessions::SessionStatus::Active => s,
            Ok(_) => {
                debug!(session_id = %session_id, "send_delta: session absent or closed, dropping");
                return;
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "send_delta: session lookup failed, dropping");
                return;
            }
        };

        let metadata = serde_json::to_value(&session.adapter_metadata).unwrap_or(serde_json::Value::Null);
        let sends = session.adapter_types.iter().filter_map(|kind| {
            let adapter = self.adapters.get(kind.as_str())?;
            let adapter = Arc::clone(adapter);
            let text = match adapter.output_form() {
                crate::types::OutputForm::Human => human,
                crate::types::OutputForm::Agent => agent,
            };
            if text.is_empty() {
                return None;
            }
            let text = text.to_string();
            let metadata = metadata.clone();
            let session_id = session_id.clone();
            Some(async move {
                match adapter.send_message(&session_id, &text, &metadata).await {
                    Ok(_) => {}
                    Err(e) => warn!(adapter = adapter.name(), session_id = %session_id, error = %e, "delta send failed"),
                }
            })
        });

        join_all(sends).await;
    }

    /// Send a transient feedback/notice message (e.g. "thinking...") on a
    /// single adapter, tracking its id for deletion before the next
    /// substantive broadcast (spec §4.3).
    pub async fn send_transient(&self, session_id: &SessionId, adapter_name: &'static str, text: &str) -> Result<()> {
        let adapter = self
            .adapters
            .get(adapter_name)
            .ok_or_else(|| AdapterError::ConfigError { adapter: adapter_name.to_string(), cause: "not registered".into() })?;
        let message_id = adapter.send_message(session_id, text, &serde_json::Value::Null).await?;
        self.transient
            .entry(session_id.to_string())
            .or_default()
            .push((adapter_name, message_id));
        Ok(())
    }

    async fn flush_transient(&self, session_id: &SessionId) {
        let Some((_, pending)) = self.transient.remove(&session_id.to_string()) else {
            return;
        };
        for (adapter_name, message_id) in pending {
            if let Some(adapter) = self.adapters.get(adapter_name) {
                if let Err(e) = adapter.delete_message(session_id, &message_id).await {
                    debug!(adapter = adapter_name, error = %e, "best-effort transient delete failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DispatchStatus, InboundMetadata, OutputForm};
    use async_trait::async_trait;
    use rusqlite::Connection;
    use std::sync::Mutex;
    use teleclaude_core::AdapterKind;

    struct EchoHandlers {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl InboundHandlers for EchoHandlers {
        async fn handle_command(&self, name: &str, _args: &[String], _metadata: &InboundMetadata) -> Result<serde_json::Value> {
            self.calls.lock().unwrap().push(format!("command:{name}"));
            Ok(serde_json::json!({"handled": name}))
        }
        async fn handle_message(&self, text: &str, _metadata: &InboundMetadata) -> Result<serde_json::Value> {
            self.calls.lock().unwrap().push(format!("message:{text}"));
            Ok(serde_json::json!({"echo": text}))
        }
        async fn handle_voice(&self, _blob: &[u8], _metadata: &InboundMetadata) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        async fn handle_file(&self, _blob: &[u8], _filename: &str, _metadata: &InboundMetadata) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    struct NullAdapter;
    #[async_trait]
    impl Adapter for NullAdapter {
        fn name(&self) -> &'static str {
            "telegram"
        }
        fn output_form(&self) -> OutputForm {
            OutputForm::Human
        }
        async fn start(&self) -> Result<()> {
            Ok(())
        }
        async fn stop(&self) -> Result<()> {
            Ok(())
        }
        async fn send_message(&self, _session_id: &SessionId, _text: &str, _metadata: &serde_json::Value) -> Result<String> {
            Ok("msg-1".to_string())
        }
        async fn delete_message(&self, _session_id: &SessionId, _message_id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn test_sessions() -> Arc<SessionManager> {
        let conn = Connection::open_in_memory().unwrap();
        teleclaude_sessions::db::init_db(&conn).unwrap();
        Arc::new(SessionManager::new(conn))
    }

    #[tokio::test]
    async fn dispatch_envelope_wraps_handler_result() {
        let handlers = Arc::new(EchoHandlers { calls: Mutex::new(Vec::new()) });
        let client = AdapterClient::new(handlers.clone(), test_sessions());
        let meta = InboundMetadata {
            adapter: AdapterKind::Telegram,
            platform_user_id: Some("1".into()),
            locale: None,
            origin_message_id: Some("m1".into()),
        };
        let session_id = SessionId::new();
        let env = client
            .handle_event(&session_id, InboundEvent::Message { text: "hi".into(), metadata: meta })
            .await;
        assert_eq!(env.status, DispatchStatus::Success);
        assert_eq!(handlers.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_origin_message_is_dropped() {
        let handlers = Arc::new(EchoHandlers { calls: Mutex::new(Vec::new()) });
        let client = AdapterClient::new(handlers.clone(), test_sessions());
        let meta = InboundMetadata {
            adapter: AdapterKind::Telegram,
            platform_user_id: Some("1".into()),
            locale: None,
            origin_message_id: Some("dup".into()),
        };
        let session_id = SessionId::new();
        for _ in 0..2 {
            client
                .handle_event(&session_id, InboundEvent::Message { text: "hi".into(), metadata: meta.clone() })
                .await;
        }
        assert_eq!(handlers.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_message_drops_silently_for_unknown_session() {
        let handlers = Arc::new(EchoHandlers { calls: Mutex::new(Vec::new()) });
        let mut client = AdapterClient::new(handlers, test_sessions());
        client.register(Arc::new(NullAdapter));
        // No session exists yet — must not panic, just drop.
        client.send_message(&SessionId::new(), "hello").await;
    }
}
