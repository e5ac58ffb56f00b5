//! Entry point: assembles every subsystem (Session & Terminal Bridge,
//! UCAP, Cross-Machine Mesh, Event Platform Core) and serves the REST/WS
//! adapter over a Unix domain socket (spec §6).

mod app;
mod command_handler;
mod error;
mod handlers;
mod http;
mod relay;
mod scheduler_glue;
mod tool_handler;
mod ws;

use std::sync::Arc;

use redis::aio::ConnectionManager;
use rusqlite::Connection;
use teleclaude_adapters::AdapterClient;
use teleclaude_core::config::{AdapterSecrets, TeleClaudeConfig};
use teleclaude_core::MachineName;
use teleclaude_discord::DiscordAdapter;
use teleclaude_events::cartridge::{Cartridge, DedupCartridge, NotificationProjectorCartridge};
use teleclaude_events::delivery::{ChatDeliveryCallback, DeliveryHub, WsBroadcastCallback};
use teleclaude_events::processor::EventProcessor;
use teleclaude_events::producer::EventProducer;
use teleclaude_events::store::NotificationStore;
use teleclaude_identity::IdentityResolver;
use teleclaude_mesh::Mesh;
use teleclaude_scheduler::{register_session_jobs, SchedulerEngine, SchedulerHandle};
use teleclaude_sessions::SessionManager;
use teleclaude_telegram::TelegramAdapter;
use teleclaude_terminal::output::OutputScheduler;
use teleclaude_terminal::TerminalManager;
use teleclaude_whatsapp::WhatsappAdapter;
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex};
use tracing::{info, warn};

use crate::app::AppState;
use crate::command_handler::DaemonCommandHandler;
use crate::handlers::DaemonHandlers;
use crate::relay::RelayGlue;
use crate::tool_handler::DaemonToolHandler;

const WS_NOTIFICATIONS_CAPACITY: usize = 256;
const MAX_CONCURRENT_POLLERS: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TeleClaudeConfig::load(None).unwrap_or_else(|e| {
        eprintln!("config load failed ({e}), using defaults");
        TeleClaudeConfig::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.logging.to_env_filter_directive()))
        .init();

    let secrets = AdapterSecrets::load(&config.secrets_path).unwrap_or_else(|e| {
        warn!(error = %e, "no adapter secrets loaded, chat adapters will stay disabled");
        AdapterSecrets::default()
    });

    let sessions_conn = Connection::open(&config.database.teleclaude_db_path)?;
    teleclaude_sessions::db::init_db(&sessions_conn)?;
    let sessions = Arc::new(SessionManager::new(sessions_conn));

    let identity_conn = Connection::open(&config.database.teleclaude_db_path)?;
    teleclaude_identity::db::init_db(&identity_conn)?;
    let identity = Arc::new(IdentityResolver::new(Arc::new(std::sync::Mutex::new(identity_conn))));

    let scheduler_handle = Arc::new(SchedulerHandle::new(Connection::open(&config.database.teleclaude_db_path)?)?);
    register_session_jobs(&scheduler_handle, config.session_policy.idle_timeout_secs, config.session_policy.customer_sweep_secs)?;

    let notifications = Arc::new(NotificationStore::new(Connection::open(&config.database.events_db_path)?)?);

    let terminal = Arc::new(AsyncMutex::new(TerminalManager::new()));
    let (output, mut delta_rx, mut activity_rx) = OutputScheduler::new(terminal.clone(), MAX_CONCURRENT_POLLERS, teleclaude_core::config::OUTPUT_POLL_INTERVAL_MS);
    let output = Arc::new(output);

    let machine = MachineName::from(config.mesh.machine_name.clone());
    let user = std::env::var("USER").unwrap_or_else(|_| "teleclaude".to_string());
    let host = config.mesh.machine_name.clone();
    let transport_binary_path = std::env::current_exe()?.to_string_lossy().into_owned();
    let mesh = Mesh::connect(config.mesh.clone(), user, host, transport_binary_path).await?;

    let events_client = redis::Client::open(config.mesh.stream_url.clone())?;
    let events_producer = Arc::new(EventProducer::new(ConnectionManager::new(events_client).await?, mesh.cfg.clone()));

    let admin_forum_channel_id = std::env::var("TELECLAUDE_ADMIN_FORUM_CHANNEL_ID").ok().and_then(|v| v.parse::<u64>().ok());
    let relay = Arc::new(RelayGlue::new(sessions.clone(), terminal.clone(), output.clone(), admin_forum_channel_id));

    let daemon_handlers = Arc::new(DaemonHandlers::new(
        machine,
        sessions.clone(),
        terminal.clone(),
        output.clone(),
        identity.clone(),
        events_producer.clone(),
        relay.clone(),
        config.projects_root.clone(),
    ));

    let mut adapter_client = AdapterClient::new(daemon_handlers.clone(), sessions.clone());

    let telegram_adapter = secrets.telegram.as_ref().map(|creds| {
        let adapter = Arc::new(TelegramAdapter::new(creds, sessions.clone()));
        adapter_client.register(adapter.clone());
        adapter
    });

    let discord_adapter = secrets.discord.as_ref().map(|creds| {
        let adapter = Arc::new(DiscordAdapter::new(creds, sessions.clone()));
        adapter_client.register(adapter.clone());
        adapter
    });

    let whatsapp_adapter = secrets.whatsapp.as_ref().map(|creds| {
        let adapter = Arc::new(WhatsappAdapter::new(creds, sessions.clone()));
        adapter_client.register(adapter.clone());
        adapter
    });

    let adapters = Arc::new(adapter_client);
    daemon_handlers.bind_adapters(Arc::downgrade(&adapters));
    relay.bind_adapters(Arc::downgrade(&adapters));
    if let Some(telegram_adapter) = &telegram_adapter {
        telegram_adapter.bind_client(Arc::downgrade(&adapters));
    }
    if let Some(discord_adapter) = &discord_adapter {
        discord_adapter.bind_client(Arc::downgrade(&adapters));
        relay.bind_discord(discord_adapter.clone());
    }
    if let Some(whatsapp_adapter) = &whatsapp_adapter {
        whatsapp_adapter.bind_client(Arc::downgrade(&adapters));
    }
    adapters.start_all().await;

    // Forward the output scheduler's two channels onto the already-bound
    // adapter client and session store.
    {
        let adapters = adapters.clone();
        tokio::spawn(async move {
            while let Some(delta) = delta_rx.recv().await {
                adapters.send_delta(&delta.session_id, &delta.human, &delta.agent).await;
            }
        });
    }
    {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            while let Some(activity) = activity_rx.recv().await {
                if let Err(e) = sessions.touch_activity(&activity.session_id, activity.summary) {
                    warn!(session_id = %activity.session_id, error = %e, "failed to record activity");
                }
            }
        });
    }

    let ws_notifications = broadcast::channel::<String>(WS_NOTIFICATIONS_CAPACITY).0;

    let mut delivery = DeliveryHub::new();
    {
        let tx = ws_notifications.clone();
        let notifications = notifications.clone();
        delivery.register(Arc::new(WsBroadcastCallback::new(notifications, move |payload: String| {
            let _ = tx.send(payload);
        })));
    }
    {
        // Below-workflow and in-place-update notifications never reach this
        // closure (`ChatDeliveryCallback` filters before invoking it).
        // `entity` is the notification's scoped identifier; session-domain
        // notifications carry the session id there (spec §3 Event Envelope).
        let notifications = notifications.clone();
        let adapters = adapters.clone();
        delivery.register(Arc::new(ChatDeliveryCallback::new(move |args| {
            let notifications = notifications.clone();
            let adapters = adapters.clone();
            let notification_id = args.notification_id.clone();
            tokio::spawn(async move {
                let notification = match notifications.get(&notification_id) {
                    Ok(Some(n)) => n,
                    Ok(None) => return,
                    Err(e) => {
                        warn!(error = %e, "chat delivery: notification lookup failed");
                        return;
                    }
                };
                if notification.domain != "session" {
                    return;
                }
                let session_id = teleclaude_core::SessionId::from(notification.entity.clone());
                adapters.send_message(&session_id, &notification.description).await;
            });
        })));
    }
    let delivery = Arc::new(delivery);

    let dedup: Arc<dyn Cartridge> = Arc::new(DedupCartridge::new(notifications.clone()));
    let projector = Arc::new(NotificationProjectorCartridge::new(notifications.clone()));
    let processor_client = redis::Client::open(config.mesh.stream_url.clone())?;
    let processor_conn = ConnectionManager::new(processor_client).await?;
    let processor = EventProcessor::new(processor_conn, mesh.cfg.clone(), dedup, projector, delivery.clone());
    tokio::spawn(processor.run());

    let tool_handler = Arc::new(DaemonToolHandler::new(daemon_handlers.clone(), sessions.clone(), mesh.registry.clone(), mesh.commands.clone()));
    {
        let sockets = config.sockets.clone();
        let tool_handler = tool_handler.clone();
        tokio::spawn(async move {
            if let Err(e) = teleclaude_mesh::tool_server::serve(&sockets, tool_handler).await {
                warn!(error = %e, "tool server exited");
            }
        });
    }

    let command_handler = Arc::new(DaemonCommandHandler::new(tool_handler.clone()));
    mesh.serve_commands(command_handler);

    let (fired_tx, fired_rx) = tokio::sync::mpsc::channel(64);
    let scheduler_glue = Arc::new(scheduler_glue::SchedulerGlue::new(
        sessions.clone(),
        terminal.clone(),
        events_producer.clone(),
        config.session_policy.idle_timeout_secs as i64,
        config.session_policy.customer_sweep_secs as i64,
    ));
    tokio::spawn(scheduler_glue.run(fired_rx));

    // The shutdown sender is kept alive for the process lifetime — nothing
    // currently triggers a graceful scheduler stop.
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_engine = SchedulerEngine::new(Connection::open(&config.database.teleclaude_db_path)?, Some(fired_tx))?;
    tokio::spawn(scheduler_engine.run(shutdown_rx));

    let state = Arc::new(AppState {
        config: config.clone(),
        handlers: daemon_handlers,
        sessions,
        terminal,
        identity,
        notifications,
        delivery,
        mesh,
        adapters,
        scheduler: scheduler_handle,
        whatsapp: whatsapp_adapter,
        ws_notifications,
    });

    let router = app::build_router(state);

    let socket_path = config.sockets.api_socket_path.clone();
    let _ = std::fs::remove_file(&socket_path);
    let listener = tokio::net::UnixListener::bind(&socket_path)?;
    info!(path = %socket_path, "teleclaude-daemon listening");

    axum::serve(listener, router).await?;

    Ok(())
}
