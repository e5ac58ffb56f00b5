use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use teleclaude_core::AdapterKind;

/// Metadata every adapter attaches to a normalized inbound event (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMetadata {
    pub adapter: AdapterKind,
    pub platform_user_id: Option<String>,
    pub locale: Option<String>,
    /// Original platform message id, carried so `delete_message` can later
    /// attempt a best-effort delete of the user's own message.
    pub origin_message_id: Option<String>,
}

/// The four shapes every adapter normalizes its transport-specific event
/// into before it reaches UCAP (spec §4.3 "Inbound normalization").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    Command {
        name: String,
        args: Vec<String>,
        metadata: InboundMetadata,
    },
    Message {
        text: String,
        metadata: InboundMetadata,
    },
    Voice {
        #[serde(with = "serde_bytes_as_base64")]
        blob: Vec<u8>,
        metadata: InboundMetadata,
    },
    File {
        #[serde(with = "serde_bytes_as_base64")]
        blob: Vec<u8>,
        filename: String,
        metadata: InboundMetadata,
    },
}

impl InboundEvent {
    pub fn metadata(&self) -> &InboundMetadata {
        match self {
            InboundEvent::Command { metadata, .. } => metadata,
            InboundEvent::Message { metadata, .. } => metadata,
            InboundEvent::Voice { metadata, .. } => metadata,
            InboundEvent::File { metadata, .. } => metadata,
        }
    }
}

/// Which of the Output Pipeline's two renderings an adapter wants (spec
/// §4.2 "Dual rendering"), declared at subscription time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputForm {
    /// Wrapped, ANSI-colourized, summarised.
    Human,
    /// Precise, whitespace- and newline-preserving.
    Agent,
}

/// The mandatory dispatch envelope every `handle_event` call returns (spec
/// §4.3). Callers must unwrap this rather than inspect a raw payload shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEnvelope {
    pub status: DispatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Success,
    Error,
}

impl DispatchEnvelope {
    pub fn success(data: impl Serialize) -> Self {
        Self {
            status: DispatchStatus::Success,
            data: Some(serde_json::to_value(data).unwrap_or(Value::Null)),
            error: None,
        }
    }

    pub fn success_empty() -> Self {
        Self {
            status: DispatchStatus::Success,
            data: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: DispatchStatus::Error,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, DispatchStatus::Success)
    }
}

/// Adapter-private JSON keyed by adapter identifier (spec §3
/// `adapter_metadata`), e.g. a Telegram topic id or a Discord thread id.
pub type AdapterMetadataMap = HashMap<String, Value>;

mod serde_bytes_as_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_envelope_success_carries_data() {
        let env = DispatchEnvelope::success(serde_json::json!({"ok": true}));
        assert!(env.is_success());
        assert!(env.error.is_none());
    }

    #[test]
    fn dispatch_envelope_error_has_no_data() {
        let env = DispatchEnvelope::error("boom");
        assert!(!env.is_success());
        assert_eq!(env.error.as_deref(), Some("boom"));
    }

    #[test]
    fn inbound_event_exposes_common_metadata() {
        let meta = InboundMetadata {
            adapter: AdapterKind::Telegram,
            platform_user_id: Some("42".into()),
            locale: None,
            origin_message_id: Some("m1".into()),
        };
        let event = InboundEvent::Message { text: "hi".into(), metadata: meta.clone() };
        assert_eq!(event.metadata().platform_user_id.as_deref(), Some("42"));
    }
}
