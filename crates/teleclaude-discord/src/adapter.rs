use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serenity::model::gateway::GatewayIntents;
use serenity::model::id::ChannelId;
use serenity::Client;
use teleclaude_adapters::{Adapter, AdapterClient, OutputForm};
use teleclaude_core::config::DiscordSecrets;
use teleclaude_core::SessionId;
use teleclaude_sessions::SessionManager;
use tracing::{error, info, warn};

use crate::error::DiscordError;
use crate::handler::DiscordHandler;

struct Inner {
    bot_token: String,
    sessions: Arc<SessionManager>,
    http: OnceLock<Arc<serenity::http::Http>>,
    client: OnceLock<Weak<AdapterClient>>,
}

impl Inner {
    /// Connect to Discord and keep reconnecting whenever the gateway drops.
    /// Never returns — runs for the lifetime of the process.
    async fn run(self: Arc<Self>) {
        let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::DIRECT_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

        let mut client = loop {
            match self.build_client(intents).await {
                Ok(c) => break c,
                Err(e) => {
                    error!("Discord: initial connect failed ({e}), retrying in 30s");
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
        };

        let _ = self.http.set(Arc::clone(&client.http));

        loop {
            info!("Discord: gateway connecting");

            if let Err(e) = client.start().await {
                warn!("Discord: gateway error ({e}), reconnecting in 5s");
            } else {
                info!("Discord: gateway stopped cleanly, reconnecting in 5s");
            }

            tokio::time::sleep(Duration::from_secs(5)).await;

            client = loop {
                match self.build_client(intents).await {
                    Ok(c) => break c,
                    Err(e) => {
                        error!("Discord: reconnect failed ({e}), retrying in 30s");
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                }
            };
        }
    }

    async fn build_client(&self, intents: GatewayIntents) -> Result<Client, serenity::Error> {
        let handler = DiscordHandler {
            sessions: Arc::clone(&self.sessions),
            client: self.client.get().cloned(),
            bot_id: OnceLock::new(),
        };

        Client::builder(&self.bot_token, intents).event_handler(handler).await
    }

    fn channel_for(&self, session_id: &SessionId, metadata: &serde_json::Value) -> Result<ChannelId, DiscordError> {
        let raw = metadata
            .get("discord")
            .and_then(|v| v.get("channel_id"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| DiscordError::NoChannelBound(session_id.to_string()))?;
        raw.parse::<u64>()
            .map(ChannelId::new)
            .map_err(|_| DiscordError::NoChannelBound(session_id.to_string()))
    }
}

/// Discord channel adapter.
///
/// Wraps a serenity `Client` and drives the event loop until the process
/// exits. Reconnects automatically whenever the gateway drops — the bot is
/// always online.
pub struct DiscordAdapter {
    inner: Arc<Inner>,
}

impl DiscordAdapter {
    pub fn new(secrets: &DiscordSecrets, sessions: Arc<SessionManager>) -> Self {
        Self {
            inner: Arc::new(Inner {
                bot_token: secrets.bot_token.clone(),
                sessions,
                http: OnceLock::new(),
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

    /// The gateway's HTTP handle, once connected. The Help-Desk Relay posts
    /// directly into an arbitrary admin channel id, which falls outside
    /// `Adapter::send_message`'s per-session channel binding — this is the
    /// one place that escape hatch is needed.
    pub fn http_client(&self) -> Option<Arc<serenity::http::Http>> {
        self.inner.http.get().cloned()
    }
}

#[async_trait]
impl Adapter for DiscordAdapter {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn output_form(&self) -> OutputForm {
        OutputForm::Human
    }

    async fn start(&self) -> teleclaude_adapters::error::Result<()> {
        if self.inner.bot_token.is_empty() {
            return Err(DiscordError::NoToken.into());
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
        let http = self.inner.http.get().ok_or(DiscordError::NoToken)?;
        let channel_id = self.inner.channel_for(session_id, metadata)?;
        let mut last_id = None;
        for chunk in crate::send::split_chunks(text) {
            let msg = channel_id.say(http.as_ref(), &chunk).await.map_err(DiscordError::Serenity)?;
            last_id = Some(msg.id);
        }
        Ok(last_id.map(|id| id.to_string()).unwrap_or_default())
    }

    async fn delete_message(&self, session_id: &SessionId, message_id: &str) -> teleclaude_adapters::error::Result<()> {
        let http = self.inner.http.get().ok_or(DiscordError::NoToken)?;
        let Ok(id) = message_id.parse::<u64>() else {
            return Ok(());
        };
        let Ok(Some(session)) = self.inner.sessions.get(session_id) else {
            return Ok(());
        };
        let metadata = serde_json::to_value(&session.adapter_metadata).unwrap_or(serde_json::Value::Null);
        // Best-effort: deletion failures (message already gone, missing
        // permission) are swallowed per spec §4.3's best-effort contract.
        if let Ok(channel_id) = self.inner.channel_for(session_id, &metadata) {
            let _ = channel_id.delete_message(http.as_ref(), serenity::model::id::MessageId::new(id)).await;
        }
        Ok(())
    }
}
