use std::sync::{Arc, OnceLock, Weak};

use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::UserId;
use serenity::prelude::{Context, EventHandler};
use teleclaude_adapters::{AdapterClient, InboundEvent, InboundMetadata};
use teleclaude_core::{AdapterKind, SessionId};
use teleclaude_sessions::SessionManager;
use tracing::{info, warn};

/// Serenity event handler — translates gateway messages into UCAP
/// [`InboundEvent`]s and routes them through the shared `AdapterClient`.
pub struct DiscordHandler {
    pub sessions: Arc<SessionManager>,
    pub client: Option<Weak<AdapterClient>>,
    pub bot_id: OnceLock<UserId>,
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.bot_id.set(ready.user.id).ok();
        info!(name = %ready.user.name, "Discord bot connected");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let Some(client) = self.client.as_ref().and_then(Weak::upgrade) else {
            warn!("Discord: message received before adapter client was bound, dropping");
            return;
        };

        let channel_key = msg.channel_id.to_string();
        let session_id = match self.sessions.find_by_adapter_binding(AdapterKind::Discord, &channel_key) {
            Ok(Some(session)) => session.id,
            Ok(None) => {
                // No session bound to this channel yet — mint a routing id.
                // A `new_session` command resolves and persists the real
                // binding; later messages resolve through the lookup above.
                SessionId::new()
            }
            Err(e) => {
                warn!(error = %e, "Discord: session lookup failed");
                return;
            }
        };

        let metadata = InboundMetadata {
            adapter: AdapterKind::Discord,
            platform_user_id: Some(msg.author.id.to_string()),
            locale: None,
            origin_message_id: Some(msg.id.to_string()),
        };

        let content = msg.content.trim().to_string();

        let event = if let Some(stripped) = content.strip_prefix('/') {
            let mut parts = stripped.split_whitespace();
            let name = parts.next().unwrap_or_default().to_string();
            let args = parts.map(str::to_string).collect();
            InboundEvent::Command { name, args, metadata }
        } else if let Some(voice_attachment) = msg.attachments.iter().find(|a| matches!(crate::attach::classify(a), crate::attach::AttachmentKind::Voice)) {
            match crate::attach::download_bytes(&voice_attachment.url).await {
                Ok(blob) => InboundEvent::Voice { blob, metadata },
                Err(e) => {
                    warn!(error = %e, "Discord: voice download failed");
                    return;
                }
            }
        } else if let Some(attachment) = msg.attachments.first() {
            match crate::attach::download_bytes(&attachment.url).await {
                Ok(blob) => InboundEvent::File {
                    blob,
                    filename: attachment.filename.clone(),
                    metadata,
                },
                Err(e) => {
                    warn!(error = %e, "Discord: attachment download failed");
                    return;
                }
            }
        } else if content.is_empty() {
            return;
        } else {
            InboundEvent::Message { text: content, metadata }
        };

        let _ = ctx;
        let envelope = client.handle_event(&session_id, event).await;
        if let teleclaude_adapters::DispatchStatus::Error = envelope.status {
            warn!(error = ?envelope.error, session_id = %session_id, "Discord: inbound dispatch failed");
        }
    }
}
