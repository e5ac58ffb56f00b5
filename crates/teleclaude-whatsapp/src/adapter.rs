//! WhatsApp Business Cloud API adapter.
//!
//! Unlike the Discord/Telegram adapters there is no persistent connection to
//! drive — WhatsApp delivers inbound messages via a webhook the daemon's
//! HTTP server exposes, and outbound messages go out over the Graph API.
//! `start()` only validates configuration; `receive_webhook` is the actual
//! inbound entry point, called by the daemon's webhook route.

use std::sync::{OnceLock, Weak};

use async_trait::async_trait;
use serde_json::{json, Value};
use teleclaude_adapters::{Adapter, AdapterClient, InboundEvent, InboundMetadata, OutputForm};
use teleclaude_core::config::WhatsappSecrets;
use teleclaude_core::{AdapterKind, SessionId};
use teleclaude_sessions::SessionManager;
use tracing::warn;

use crate::error::WhatsappError;
use crate::handler::InboundMessage;

const GRAPH_API_VERSION: &str = "v20.0";

struct Inner {
    access_token: String,
    phone_number_id: String,
    verify_token: String,
    app_secret: String,
    sessions: std::sync::Arc<SessionManager>,
    http: reqwest::Client,
    client: OnceLock<Weak<AdapterClient>>,
}

impl Inner {
    fn conversation_for(&self, session_id: &SessionId, metadata: &Value) -> Result<String, WhatsappError> {
        metadata
            .get("whatsapp")
            .and_then(|v| v.get("wa_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| WhatsappError::NoConversationBound(session_id.to_string()))
    }

    async fn post_message(&self, to: &str, body: &Value) -> Result<String, WhatsappError> {
        let url = format!("https://graph.facebook.com/{GRAPH_API_VERSION}/{}/messages", self.phone_number_id);
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": body,
        });
        let resp = self.http.post(&url).bearer_auth(&self.access_token).json(&payload).send().await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(WhatsappError::Api { status: status.as_u16(), body: text });
        }
        let parsed: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        let message_id = parsed
            .get("messages")
            .and_then(|m| m.get(0))
            .and_then(|m| m.get("id"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(message_id)
    }

    async fn download_media(&self, media_id: &str) -> Option<Vec<u8>> {
        let meta_url = format!("https://graph.facebook.com/{GRAPH_API_VERSION}/{media_id}");
        let meta = self.http.get(&meta_url).bearer_auth(&self.access_token).send().await.ok()?;
        let meta: Value = meta.json().await.ok()?;
        let media_url = meta.get("url").and_then(|v| v.as_str())?;
        let resp = self.http.get(media_url).bearer_auth(&self.access_token).send().await.ok()?;
        resp.bytes().await.ok().map(|b| b.to_vec())
    }
}

/// WhatsApp Business Cloud API adapter.
pub struct WhatsappAdapter {
    inner: std::sync::Arc<Inner>,
}

impl WhatsappAdapter {
    pub fn new(secrets: &WhatsappSecrets, sessions: std::sync::Arc<SessionManager>) -> Self {
        Self {
            inner: std::sync::Arc::new(Inner {
                access_token: secrets.access_token.clone(),
                phone_number_id: secrets.phone_number_id.clone(),
                verify_token: secrets.verify_token.clone(),
                app_secret: secrets.app_secret.clone(),
                sessions,
                http: reqwest::Client::new(),
                client: OnceLock::new(),
            }),
        }
    }

    /// Wires this adapter back to the `AdapterClient` that owns it. See
    /// `teleclaude-discord`'s `bind_client` for why this is a `Weak` set
    /// post-construction rather than a constructor argument.
    pub fn bind_client(&self, client: Weak<AdapterClient>) {
        let _ = self.inner.client.set(client);
    }

    /// Meta's `GET /webhook` subscription handshake.
    pub fn verify_subscription(&self, mode: &str, token: &str, challenge: &str) -> Option<String> {
        crate::webhook::verify_subscription(mode, token, challenge, &self.inner.verify_token)
    }

    /// Verify the `X-Hub-Signature-256` header on an inbound webhook POST.
    pub fn verify_signature(&self, body: &[u8], signature_header: &str) -> bool {
        crate::webhook::verify_signature(body, signature_header, &self.inner.app_secret)
    }

    /// Entry point for the daemon's webhook route: parse and dispatch every
    /// message carried in a single webhook delivery.
    pub async fn receive_webhook(&self, payload: &Value) {
        let Some(client) = self.inner.client.get().and_then(Weak::upgrade) else {
            warn!("WhatsApp: webhook received before adapter client was bound, dropping");
            return;
        };

        for msg in crate::handler::extract_messages(payload) {
            self.dispatch_message(&client, msg).await;
        }
    }

    async fn dispatch_message(&self, client: &std::sync::Arc<AdapterClient>, msg: InboundMessage) {
        let session_id = match self.inner.sessions.find_by_adapter_binding(AdapterKind::Whatsapp, &msg.from) {
            Ok(Some(session)) => session.id,
            Ok(None) => SessionId::new(),
            Err(e) => {
                warn!(error = %e, "WhatsApp: session lookup failed");
                return;
            }
        };

        let metadata = InboundMetadata {
            adapter: AdapterKind::Whatsapp,
            platform_user_id: Some(msg.from.clone()),
            locale: None,
            origin_message_id: Some(msg.id.clone()),
        };

        let event = if let Some(text) = msg.text {
            if let Some(stripped) = text.body.trim().strip_prefix('/') {
                let mut parts = stripped.split_whitespace();
                let name = parts.next().unwrap_or_default().to_string();
                let args = parts.map(str::to_string).collect();
                InboundEvent::Command { name, args, metadata }
            } else {
                InboundEvent::Message { text: text.body, metadata }
            }
        } else if let Some(media) = msg.voice.or(msg.audio) {
            match self.inner.download_media(&media.id).await {
                Some(blob) => InboundEvent::Voice { blob, metadata },
                None => {
                    warn!(media_id = %media.id, "WhatsApp: voice download failed");
                    return;
                }
            }
        } else if let Some(media) = msg.document.or(msg.image) {
            let filename = media.filename.clone().unwrap_or_else(|| media.id.clone());
            match self.inner.download_media(&media.id).await {
                Some(blob) => InboundEvent::File { blob, filename, metadata },
                None => {
                    warn!(media_id = %media.id, "WhatsApp: attachment download failed");
                    return;
                }
            }
        } else {
            // Unsupported message type (location, contacts, reaction, ...).
            return;
        };

        let envelope = client.handle_event(&session_id, event).await;
        if let teleclaude_adapters::DispatchStatus::Error = envelope.status {
            warn!(error = ?envelope.error, session_id = %session_id, "WhatsApp: inbound dispatch failed");
        }
    }
}

#[async_trait]
impl Adapter for WhatsappAdapter {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    fn output_form(&self) -> OutputForm {
        OutputForm::Human
    }

    async fn start(&self) -> teleclaude_adapters::error::Result<()> {
        if self.inner.access_token.is_empty() || self.inner.phone_number_id.is_empty() {
            return Err(WhatsappError::NoToken.into());
        }
        // No connection loop to drive — inbound arrives via the daemon's
        // webhook route, which calls `receive_webhook` directly.
        Ok(())
    }

    async fn stop(&self) -> teleclaude_adapters::error::Result<()> {
        Ok(())
    }

    async fn send_message(&self, session_id: &SessionId, text: &str, metadata: &Value) -> teleclaude_adapters::error::Result<String> {
        let to = self.inner.conversation_for(session_id, metadata)?;
        let mut last_id = String::new();
        for chunk in crate::send::split_chunks(text) {
            last_id = self.inner.post_message(&to, &json!({"body": chunk})).await?;
        }
        Ok(last_id)
    }

    async fn delete_message(&self, _session_id: &SessionId, _message_id: &str) -> teleclaude_adapters::error::Result<()> {
        // The Cloud API has no message-deletion endpoint for business-sent
        // messages; best-effort contract is satisfied by doing nothing.
        Ok(())
    }
}
