//! Help-Desk Relay glue (spec §4.7): escalation thread creation, inbound
//! diversion, and the `@agent` handback that returns control to the
//! terminal pane.
//!
//! The admin-facing thread is driven entirely through
//! `DiscordAdapter::http_client()` — the same `Arc<serenity::http::Http>`
//! handle the gateway connection itself uses once established, kept alive
//! across gateway reconnects. Rather than hooking the gateway's own event
//! handler (which only knows about channels already bound to a session),
//! each open relay thread gets a small polling task here that watches for
//! new messages via the REST handle directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use regex::Regex;
use serenity::all::{ChannelId, CreateForumPost, CreateMessage, GetMessages};
use teleclaude_adapters::types::InboundMetadata;
use teleclaude_adapters::AdapterClient;
use teleclaude_core::error::{CoreError, ErrorKind, Result};
use teleclaude_core::SessionId;
use teleclaude_discord::DiscordAdapter;
use teleclaude_sessions::types::Session;
use teleclaude_sessions::SessionManager;
use teleclaude_terminal::output::OutputScheduler;
use teleclaude_terminal::TerminalManager;
use tracing::{info, warn};

const RELAY_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Matches the literal `@agent` mention token — not the bare word `agent`
/// anywhere in the text, and not `user@agent.com` (spec §4.7: the matcher
/// must not fire on `engagement` or an email-shaped `@agent` substring).
fn handback_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:^|[^\w@])@agent\b").expect("static handback regex"))
}

/// Strips the ANSI escapes and raw control bytes the spec requires before
/// any relay-sourced text is injected into a pane.
fn sanitize_for_pane(text: &str) -> String {
    let stripped = strip_ansi_escapes::strip(text.as_bytes());
    let stripped = String::from_utf8_lossy(&stripped).into_owned();
    stripped.chars().filter(|c| !c.is_control() || *c == '\n' || *c == '\t').collect()
}

struct ThreadState {
    channel_id: ChannelId,
    last_seen: Option<u64>,
}

pub struct RelayGlue {
    discord: OnceLock<Arc<DiscordAdapter>>,
    adapters: OnceLock<std::sync::Weak<AdapterClient>>,
    sessions: Arc<SessionManager>,
    terminal: Arc<tokio::sync::Mutex<TerminalManager>>,
    output: Arc<OutputScheduler>,
    admin_forum_channel_id: Option<ChannelId>,
    threads: Mutex<HashMap<String, ThreadState>>,
}

impl RelayGlue {
    pub fn new(
        sessions: Arc<SessionManager>,
        terminal: Arc<tokio::sync::Mutex<TerminalManager>>,
        output: Arc<OutputScheduler>,
        admin_forum_channel_id: Option<u64>,
    ) -> Self {
        Self {
            discord: OnceLock::new(),
            adapters: OnceLock::new(),
            sessions,
            terminal,
            output,
            admin_forum_channel_id: admin_forum_channel_id.map(ChannelId::new),
            threads: Mutex::new(HashMap::new()),
        }
    }

    pub fn bind_discord(&self, discord: Arc<DiscordAdapter>) {
        let _ = self.discord.set(discord);
    }

    pub fn bind_adapters(&self, adapters: std::sync::Weak<AdapterClient>) {
        let _ = self.adapters.set(adapters);
    }

    /// Creates the escalation thread and starts this relay's admin-reply
    /// poller. Returns the Discord channel id to persist on the session.
    pub async fn open_thread(self: Arc<Self>, session_id: &SessionId, reason: &str, context: Option<&str>) -> Result<String> {
        let http = self
            .discord
            .get()
            .and_then(|d| d.http_client())
            .ok_or_else(|| CoreError::new(ErrorKind::TransientTransport, "discord gateway not connected"))?;
        let forum = self
            .admin_forum_channel_id
            .ok_or_else(|| CoreError::new(ErrorKind::InvalidInput, "no admin forum channel configured for the help desk relay"))?;

        let mut opening = format!("Escalation from session `{session_id}`\nReason: {reason}");
        if let Some(ctx) = context {
            opening.push_str(&format!("\nContext: {ctx}"));
        }

        let post = CreateForumPost::new(format!("session-{session_id}"), CreateMessage::new().content(opening));
        let thread = http
            .create_forum_post(forum, &post)
            .await
            .map_err(|e| CoreError::new(ErrorKind::TransientTransport, format!("failed to create relay thread: {e}")))?;

        let channel_id = thread.id;
        self.threads.lock().unwrap().insert(
            session_id.to_string(),
            ThreadState { channel_id, last_seen: None },
        );

        let this = Arc::clone(self);
        let sid = session_id.clone();
        tokio::spawn(async move { this.poll_thread(sid).await });

        Ok(channel_id.to_string())
    }

    /// Forwards a customer-side message into the relay thread instead of
    /// the terminal pane (spec §4.7 inbound diversion).
    pub async fn divert_inbound(&self, session: &Session, text: &str, metadata: &InboundMetadata) {
        let Some(channel_id) = session.relay_discord_channel_id.as_deref() else {
            warn!(session_id = %session.id, "divert_inbound called without a relay channel bound");
            return;
        };
        let Some(http) = self.discord.get().and_then(|d| d.http_client()) else {
            warn!(session_id = %session.id, "discord gateway not connected, dropping diverted message");
            return;
        };
        let Ok(channel) = channel_id.parse::<u64>().map(ChannelId::new) else {
            return;
        };
        let platform = metadata.adapter.as_str();
        let name = metadata.platform_user_id.as_deref().unwrap_or("customer");
        let formatted = format!("{name} ({platform}): {text}");
        if let Err(e) = channel.send_message(&http, CreateMessage::new().content(formatted)).await {
            warn!(session_id = %session.id, error = %e, "failed to forward diverted message to relay thread");
        }
    }

    async fn poll_thread(self: Arc<Self>, session_id: SessionId) {
        loop {
            tokio::time::sleep(RELAY_POLL_INTERVAL).await;

            let active = self.sessions.is_relay_active(&session_id).unwrap_or(false);
            if !active {
                self.threads.lock().unwrap().remove(&session_id.to_string());
                return;
            }

            let Some(http) = self.discord.get().and_then(|d| d.http_client()) else {
                continue;
            };

            let (channel_id, last_seen) = {
                let threads = self.threads.lock().unwrap();
                let Some(state) = threads.get(&session_id.to_string()) else { return };
                (state.channel_id, state.last_seen)
            };

            let query = match last_seen {
                Some(id) => GetMessages::new().after(serenity::all::MessageId::new(id)),
                None => GetMessages::new().limit(50),
            };
            let messages = match channel_id.messages(&http, query).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "relay thread poll failed");
                    continue;
                }
            };
            if messages.is_empty() {
                continue;
            }

            let mut newest = last_seen;
            // Discord returns newest-first; process chronologically.
            for msg in messages.iter().rev() {
                if msg.author.bot {
                    continue;
                }
                newest = Some(newest.map_or(msg.id.get(), |n| n.max(msg.id.get())));
                self.handle_admin_message(&session_id, &msg.author.name, &msg.content).await;
            }

            if let Some(state) = self.threads.lock().unwrap().get_mut(&session_id.to_string()) {
                state.last_seen = newest;
            }
        }
    }

    async fn handle_admin_message(&self, session_id: &SessionId, author: &str, text: &str) {
        if handback_pattern().is_match(text) {
            self.handback(session_id).await;
            return;
        }

        let Some(adapters) = self.adapters.get().and_then(std::sync::Weak::upgrade) else {
            return;
        };
        adapters.send_message(session_id, &format!("[help desk] {author}: {text}")).await;
    }

    async fn handback(&self, session_id: &SessionId) {
        let Ok(Some(session)) = self.sessions.get(session_id) else { return };
        let Some(started_at) = session.relay_started_at.clone() else { return };

        let context = self.collect_context(session_id, &started_at).await;
        let sanitized = sanitize_for_pane(&context);

        let injected = {
            let terminal = self.terminal.lock().await;
            terminal.send_text(session_id, &sanitized, false)
        };
        if let Err(e) = injected {
            warn!(session_id = %session_id, error = %e, "handback injection failed");
            return;
        }
        self.output.reset_baseline_after_injection(session_id).await;

        if let Err(e) = self.sessions.clear_relay(session_id) {
            warn!(session_id = %session_id, error = %e, "failed to clear relay state after handback");
        }
        self.threads.lock().unwrap().remove(&session_id.to_string());
        info!(session_id = %session_id, "help desk relay handed back to the agent");
    }

    /// Builds the chronological, bot-filtered context block the spec
    /// requires before handback, covering every message since
    /// `relay_started_at`.
    async fn collect_context(&self, session_id: &SessionId, _relay_started_at: &str) -> String {
        let Some(http) = self.discord.get().and_then(|d| d.http_client()) else {
            return String::new();
        };
        let Some(channel_id) = self.threads.lock().unwrap().get(&session_id.to_string()).map(|s| s.channel_id) else {
            return String::new();
        };

        let messages = channel_id.messages(&http, GetMessages::new().limit(100)).await.unwrap_or_default();
        let mut lines: Vec<String> = messages
            .into_iter()
            .rev()
            .filter(|m| !m.author.bot)
            .map(|m| format!("{}: {}", m.author.name, m.content))
            .collect();
        lines.insert(0, "--- help desk relay context ---".to_string());
        lines.join("\n")
    }
}

/// The forum channel relay threads are created under is Discord-specific
/// and not part of the generic cross-machine config, so it is read
/// directly from its own environment variable rather than threaded
/// through `TeleClaudeConfig`.
pub fn admin_forum_channel_from_env() -> Option<u64> {
    std::env::var("TELECLAUDE_RELAY_FORUM_CHANNEL_ID").ok().and_then(|s| s.parse().ok())
}
