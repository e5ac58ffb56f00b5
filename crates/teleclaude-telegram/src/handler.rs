use std::sync::{Arc, Weak};

use teloxide::prelude::*;
use tracing::warn;

use teleclaude_adapters::{AdapterClient, InboundEvent, InboundMetadata};
use teleclaude_core::{AdapterKind, SessionId};
use teleclaude_sessions::SessionManager;

/// Default per-attachment download cap. Telegram's own bot API file-size
/// limit is 20MB; we stay well under it.
const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Translates teloxide `Message` updates into UCAP [`InboundEvent`]s and
/// routes them through the shared `AdapterClient`.
pub struct TelegramHandler {
    pub sessions: Arc<SessionManager>,
    pub client: Option<Weak<AdapterClient>>,
}

impl TelegramHandler {
    pub async fn handle(&self, bot: Bot, msg: Message) {
        let Some(from) = msg.from.as_ref() else {
            return;
        };
        if from.is_bot {
            return;
        }

        let Some(client) = self.client.as_ref().and_then(Weak::upgrade) else {
            warn!("Telegram: message received before adapter client was bound, dropping");
            return;
        };

        let chat_key = msg.chat.id.to_string();
        let session_id = match self.sessions.find_by_adapter_binding(AdapterKind::Telegram, &chat_key) {
            Ok(Some(session)) => session.id,
            Ok(None) => {
                // No session bound to this chat yet — mint a routing id.
                // A `new_session` command resolves and persists the real
                // binding; later messages resolve through the lookup above.
                SessionId::new()
            }
            Err(e) => {
                warn!(error = %e, "Telegram: session lookup failed");
                return;
            }
        };

        let metadata = InboundMetadata {
            adapter: AdapterKind::Telegram,
            platform_user_id: Some(from.id.to_string()),
            locale: from.language_code.clone(),
            origin_message_id: Some(msg.id.to_string()),
        };

        let text = msg.text().or(msg.caption()).unwrap_or("").trim().to_string();

        let event = if let Some(stripped) = text.strip_prefix('/') {
            let mut parts = stripped.split_whitespace();
            let name = parts.next().unwrap_or_default().to_string();
            let args = parts.map(str::to_string).collect();
            InboundEvent::Command { name, args, metadata }
        } else if let Some(media) = crate::attach::extract_media(&bot, &msg, MAX_ATTACHMENT_BYTES).await {
            match media {
                crate::attach::Media::Voice { blob } => InboundEvent::Voice { blob, metadata },
                crate::attach::Media::File { blob, filename } => InboundEvent::File { blob, filename, metadata },
            }
        } else if text.is_empty() {
            return;
        } else {
            InboundEvent::Message { text, metadata }
        };

        let envelope = client.handle_event(&session_id, event).await;
        if let teleclaude_adapters::DispatchStatus::Error = envelope.status {
            warn!(error = ?envelope.error, session_id = %session_id, "Telegram: inbound dispatch failed");
        }
    }
}
