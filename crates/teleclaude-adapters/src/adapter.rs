use async_trait::async_trait;
use teleclaude_core::SessionId;

use crate::error::{AdapterError, Result};
use crate::types::OutputForm;

/// Capability set implemented by every I/O surface — Telegram, Discord,
/// WhatsApp, the web client, the REST adapter, the Redis stream adapter.
///
/// Spec §9 REDESIGN FLAG: the teacher's `BaseAdapter`/`UiAdapter`
/// inheritance hierarchy is replaced by a flat capability set plus a
/// configuration record; there is no base class here to extend.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable lowercase identifier, matching `AdapterKind::as_str()`.
    fn name(&self) -> &'static str;

    /// Which rendering this adapter wants from the Output Pipeline (spec
    /// §4.2 "Each adapter declares which form it wants at subscription
    /// time").
    fn output_form(&self) -> OutputForm;

    /// Begin serving inbound events. Implementations normalize their
    /// transport-specific events into [`crate::types::InboundEvent`] and
    /// hand them to the registered callback (see
    /// [`crate::client::AdapterClient::register`]).
    async fn start(&self) -> Result<()>;

    /// Gracefully stop serving inbound events.
    async fn stop(&self) -> Result<()>;

    /// Deliver outbound text to this adapter's transport for `session_id`,
    /// with adapter-private metadata (e.g. which Telegram topic / Discord
    /// thread to post into).
    async fn send_message(&self, session_id: &SessionId, text: &str, metadata: &serde_json::Value) -> Result<String>;

    /// Best-effort delete of a previously sent message. Adapters that can't
    /// delete (or the message has expired) return `Ok(())` — this is never
    /// allowed to fail the caller's flow (spec §4.3).
    async fn delete_message(&self, session_id: &SessionId, message_id: &str) -> Result<()>;

    /// Deliver text that originated from outside the normal Output
    /// Pipeline poll — e.g. a relay handback notice, or a cross-machine
    /// mirrored message. `origin_hint` lets the adapter pick a
    /// presentation (e.g. a system-style prefix) without it being mistaken
    /// for agent output.
    async fn deliver_to_session(&self, session_id: &SessionId, text: &str, origin_hint: &str) -> Result<()> {
        self.send_message(session_id, text, &serde_json::json!({"origin": origin_hint}))
            .await
            .map(|_| ())
    }
}

/// Helper adapters can use to report a send failure without panicking.
pub fn send_failed(name: &str, cause: impl std::fmt::Display) -> AdapterError {
    AdapterError::SendFailed {
        adapter: name.to_string(),
        cause: cause.to_string(),
    }
}
