//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives the long-polling event
//! loop until the process exits. Reconnects automatically on dispatcher exit.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teleclaude_adapters::{Adapter, AdapterClient, OutputForm};
use teleclaude_core::config::TelegramSecrets;
use teleclaude_core::SessionId;
use tracing::{info, warn};
use teleclaude_sessions::SessionManager;

use crate::error::TelegramError;
use crate::handler::TelegramHandler;

struct Inner {
    bot_token: String,
    sessions: Arc<SessionManager>,
    bot: OnceLock<Bot>,
    client: OnceLock<Weak<AdapterClient>>,
}

impl Inner {
    /// Drive the long-polling dispatcher and keep reconnecting whenever it
    /// exits. Never returns — runs for the lifetime of the process.
    async fn run(self: Arc<Self>) {
        let bot = Bot::new(&self.bot_token);
        let _ = self.bot.set(bot.clone());

        loop {
            info!("Telegram: starting long-polling dispatcher");

            let handler = TelegramHandler {
                sessions: Arc::clone(&self.sessions),
                client: self.client.get().cloned(),
            };
            let handler = Arc::new(handler);

            let tree = Update::filter_message().endpoint(
                |bot: Bot, msg: Message, handler: Arc<TelegramHandler>| async move {
                    handler.handle(bot, msg).await;
                    respond(())
                },
            );

            Dispatcher::builder(bot.clone(), tree)
                .dependencies(dptree::deps![handler])
                .default_handler(|_upd| async {})
                .build()
                .dispatch()
                .await;

            warn!("Telegram: dispatcher exited, restarting in 5s");
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    }

    fn chat_for(&self, session_id: &SessionId, metadata: &serde_json::Value) -> Result<ChatId, TelegramError> {
        let raw = metadata
            .get("telegram")
            .and_then(|v| v.get("chat_id"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| TelegramError::NoChatBound(session_id.to_string()))?;
        raw.parse::<i64>()
            .map(ChatId)
            .map_err(|_| TelegramError::NoChatBound(session_id.to_string()))
    }
}

/// Telegram channel adapter.
///
/// Wraps a teloxide `Bot` and drives the Dispatcher event loop until the
/// process exits. Long polling — no public URL required.
pub struct TelegramAdapter {
    inner: Arc<Inner>,
}

impl TelegramAdapter {
    pub fn new(secrets: &TelegramSecrets, sessions: Arc<SessionManager>) -> Self {
        Self {
            inner: Arc::new(Inner {
                bot_token: secrets.bot_token.clone(),
                sessions,
                bot: OnceLock::new(),
                client: OnceLock::new(),
            }),
        }
    }

    /// Wires this adapter back to the `AdapterClient` that owns it. Called
    /// once by the daemon after the `AdapterClient` is wrapped in its `Arc`
    /// — doing it this way (rather than the adapter owning a strong
    /// reference) avoids an `Arc` reference cycle between the two.
    pub fn bind_client(&self, client: Weak<AdapterClient>) {
        let _ = self.inner.client.set(client);
    }
}

#[async_trait]
impl Adapter for TelegramAdapter {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn output_form(&self) -> OutputForm {
        OutputForm::Human
    }

    async fn start(&self) -> teleclaude_adapters::error::Result<()> {
        if self.inner.bot_token.is_empty() {
            return Err(TelegramError::NoToken.into());
        }
        // `run` never returns; detach it so `start_all` can continue wiring
        // the other adapters (spec §4.3 "per-adapter start failure isolation").
        tokio::spawn(Arc::clone(&self.inner).run());
        Ok(())
    }

    async fn stop(&self) -> teleclaude_adapters::error::Result<()> {
        Ok(())
    }

    async fn send_message(&self, session_id: &SessionId, text: &str, metadata: &serde_json::Value) -> teleclaude_adapters::error::Result<String> {
        let bot = self.inner.bot.get().ok_or(TelegramError::NoToken)?;
        let chat_id = self.inner.chat_for(session_id, metadata)?;
        let message_id = crate::send::send_response(bot, chat_id, text).await;
        Ok(message_id.map(|id| id.to_string()).unwrap_or_default())
    }

    async fn delete_message(&self, _session_id: &SessionId, _message_id: &str) -> teleclaude_adapters::error::Result<()> {
        // Telegram bots generally lack delete rights in DMs and the daemon
        // doesn't retain per-chunk message ids after `send_response` splits
        // long replies; deletion is best-effort and a no-op here.
        Ok(())
    }
}
