//! WhatsApp Cloud API webhook payload parsing.
//!
//! Meta delivers inbound messages as a nested `entry[].changes[].value`
//! structure rather than one event per request; a single POST can carry
//! several messages for several different conversations at once.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    pub value: ChangeValue,
}

#[derive(Debug, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub audio: Option<MediaRef>,
    #[serde(default)]
    pub voice: Option<MediaRef>,
    #[serde(default)]
    pub document: Option<MediaRef>,
    #[serde(default)]
    pub image: Option<MediaRef>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaRef {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Flatten a webhook POST body into its individual inbound messages.
pub fn extract_messages(payload: &Value) -> Vec<InboundMessage> {
    let parsed: WebhookPayload = match serde_json::from_value(payload.clone()) {
        Ok(p) => p,
        Err(_) => return Vec::new(),
    };
    parsed
        .entry
        .into_iter()
        .flat_map(|e| e.changes)
        .flat_map(|c| c.value.messages)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_text_message_from_nested_payload() {
        let payload = json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [{
                            "from": "15551234567",
                            "id": "wamid.abc",
                            "type": "text",
                            "text": {"body": "hello"}
                        }]
                    }
                }]
            }]
        });
        let messages = extract_messages(&payload);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from, "15551234567");
        assert_eq!(messages[0].text.as_ref().unwrap().body, "hello");
    }

    #[test]
    fn ignores_status_only_payload() {
        let payload = json!({
            "entry": [{"changes": [{"value": {"statuses": [{"id": "wamid.abc"}]}}]}]
        });
        assert!(extract_messages(&payload).is_empty());
    }

    #[test]
    fn malformed_payload_yields_no_messages() {
        let payload = json!({"unexpected": "shape"});
        assert!(extract_messages(&payload).is_empty());
    }
}
