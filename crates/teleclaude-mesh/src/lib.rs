//! Cross-Machine Mesh: heartbeat-based peer discovery, durable per-machine
//! command streams, per-session output mirroring, and the role-gated Tool
//! Server AI agents use to collaborate across machines (spec §4.5/§4.6).

pub mod commands;
pub mod error;
pub mod heartbeat;
pub mod output_stream;
pub mod peers;
pub mod role_gate;
pub mod tool_server;
pub mod types;

pub use commands::{CommandBus, CommandHandler};
pub use error::{MeshError, Result};
pub use output_stream::{OutputChunk, OutputPublisher};
pub use peers::PeerRegistry;
pub use tool_server::ToolHandler;
pub use types::{CommandEnvelope, CommandResponse, HeartbeatPayload, Peer, PeerStatus, ToolOperation, ToolRequest, ToolResponse, ToolResponseStatus};

use std::sync::Arc;

use redis::aio::ConnectionManager;
use teleclaude_core::config::MeshConfig;

/// Everything a running daemon needs to participate in the mesh, assembled
/// once at startup from a single Redis connection manager.
pub struct Mesh {
    pub registry: Arc<PeerRegistry>,
    pub commands: Arc<CommandBus>,
    pub output: Arc<OutputPublisher>,
    pub cfg: Arc<MeshConfig>,
}

impl Mesh {
    pub async fn connect(cfg: MeshConfig, user: String, host: String, transport_binary_path: String) -> Result<Self> {
        let client = redis::Client::open(cfg.stream_url.clone())?;
        let conn = ConnectionManager::new(client).await?;
        let cfg = Arc::new(cfg);

        let ttl = std::time::Duration::from_secs(cfg.heartbeat_ttl_secs());
        let registry = Arc::new(PeerRegistry::new(
            teleclaude_core::MachineName::from(cfg.machine_name.clone()),
            ttl,
            user.clone(),
            host.clone(),
            transport_binary_path.clone(),
        ));

        let commands = CommandBus::new(conn.clone(), cfg.clone(), registry.clone());
        let output = Arc::new(OutputPublisher::new(conn.clone(), cfg.clone()));

        tokio::spawn(heartbeat::run_publisher(conn.clone(), cfg.clone(), user, host, transport_binary_path));
        tokio::spawn(heartbeat::run_consumer(conn, cfg.clone(), registry.clone()));
        tokio::spawn(commands.clone().run_response_listener());

        Ok(Self {
            registry,
            commands,
            output,
            cfg,
        })
    }

    /// Starts serving cross-machine commands addressed to this machine.
    /// Separate from `connect` so the daemon can wire its handler only
    /// once session/adapter state is ready.
    pub fn serve_commands(&self, handler: Arc<dyn CommandHandler>) {
        tokio::spawn(self.commands.clone().run_server(handler));
    }
}
