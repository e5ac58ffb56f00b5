use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use teleclaude_core::config::MeshConfig;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{MeshError, Result};
use crate::peers::PeerRegistry;
use crate::types::{CommandEnvelope, CommandResponse};

const CONSUMER_GROUP: &str = "teleclaude-mesh";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

fn command_stream_key(machine: &str) -> String {
    format!("commands:{machine}")
}

fn response_stream_key(machine: &str) -> String {
    format!("responses:{machine}")
}

/// Implemented by the daemon to actually run a cross-machine command
/// against local session/adapter state. Kept here (rather than depending
/// down from the daemon) so this crate stays free of a daemon dependency.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, envelope: CommandEnvelope) -> CommandResponse;
}

/// Dispatches commands to remote machines over per-machine durable streams
/// and serves incoming commands addressed to this machine (spec §4.5).
pub struct CommandBus {
    conn: Mutex<ConnectionManager>,
    cfg: Arc<MeshConfig>,
    registry: Arc<PeerRegistry>,
    pending: DashMap<String, oneshot::Sender<CommandResponse>>,
}

impl CommandBus {
    pub fn new(conn: ConnectionManager, cfg: Arc<MeshConfig>, registry: Arc<PeerRegistry>) -> Arc<Self> {
        Arc::new(Self {
            conn: Mutex::new(conn),
            cfg,
            registry,
            pending: DashMap::new(),
        })
    }

    /// Sends a command to `target_machine` and awaits its response, failing
    /// fast if the peer has no fresh heartbeat (spec §8 scenario 6).
    pub async fn send(
        &self,
        target_machine: &str,
        operation: &str,
        target_session_id: Option<String>,
        initiator_session_id: Option<String>,
        arguments: serde_json::Value,
    ) -> Result<CommandResponse> {
        if !self.registry.is_online(target_machine) {
            return Err(MeshError::PeerOffline(target_machine.to_string()));
        }

        let correlation_id = Uuid::new_v4().to_string();
        let envelope = CommandEnvelope {
            correlation_id: correlation_id.clone(),
            initiator_machine: self.cfg.machine_name.clone(),
            initiator_session_id,
            target_session_id,
            operation: operation.to_string(),
            arguments,
        };
        let body = serde_json::to_string(&envelope).map_err(|e| MeshError::Framing(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(correlation_id.clone(), tx);

        {
            let mut conn = self.conn.lock().unwrap().clone();
            let stream = command_stream_key(target_machine);
            let result: redis::RedisResult<String> = conn
                .xadd_maxlen(&stream, redis::streams::StreamMaxlen::Approx(self.cfg.stream_maxlen), "*", &[("payload", body)])
                .await;
            if let Err(err) = result {
                self.pending.remove(&correlation_id);
                return Err(MeshError::StreamTransport(err));
            }
        }

        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(MeshError::CommandTimeout {
                machine: target_machine.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
            Err(_) => {
                self.pending.remove(&correlation_id);
                Err(MeshError::CommandTimeout {
                    machine: target_machine.to_string(),
                    timeout_secs: timeout.as_secs(),
                })
            }
        }
    }

    /// Serves commands addressed to this machine: recovers any pending
    /// entries left over from a crash (PEL, read from "0") before moving on
    /// to live reads (">"), per spec §4.5 crash-recovery requirement.
    pub async fn run_server(self: Arc<Self>, handler: Arc<dyn CommandHandler>) {
        let stream = command_stream_key(&self.cfg.machine_name);
        {
            let mut conn = self.conn.lock().unwrap().clone();
            let created: redis::RedisResult<()> = conn.xgroup_create_mkstream(&stream, CONSUMER_GROUP, "0").await;
            if let Err(err) = created {
                debug!(error = %err, "consumer group already exists or stream init failed");
            }
        }

        let consumer_name = format!("{}-server", self.cfg.machine_name);

        // PEL recovery pass: re-claim and process anything left unacked.
        self.drain_with_id(&stream, &consumer_name, "0", handler.clone()).await;

        loop {
            self.drain_with_id(&stream, &consumer_name, ">", handler.clone()).await;
        }
    }

    async fn drain_with_id(&self, stream: &str, consumer_name: &str, start_id: &str, handler: Arc<dyn CommandHandler>) {
        let opts = redis::streams::StreamReadOptions::default().group(CONSUMER_GROUP, consumer_name).count(16).block(if start_id == ">" { 5_000 } else { 0 });
        let reply: redis::RedisResult<redis::streams::StreamReadReply> = {
            let mut conn = self.conn.lock().unwrap().clone();
            conn.xread_options(&[stream], &[start_id], &opts).await
        };
        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "command stream read failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                return;
            }
        };

        for key in reply.keys {
            for entry in key.ids {
                let Some(redis::Value::BulkString(raw)) = entry.map.get("payload") else {
                    continue;
                };
                let envelope: CommandEnvelope = match serde_json::from_slice(raw) {
                    Ok(e) => e,
                    Err(err) => {
                        error!(error = %err, id = %entry.id, "dropping malformed command envelope");
                        self.ack(stream, &entry.id).await;
                        continue;
                    }
                };

                if envelope.initiator_machine == self.cfg.machine_name {
                    // Loopback: our own command addressed to ourselves already
                    // ran synchronously; the stream copy just needs acking.
                    self.ack(stream, &entry.id).await;
                    continue;
                }

                let response = handler.handle(envelope.clone()).await;
                self.publish_response(&envelope.initiator_machine, &response).await;
                self.ack(stream, &entry.id).await;
            }
        }
    }

    async fn ack(&self, stream: &str, id: &str) {
        let mut conn = self.conn.lock().unwrap().clone();
        let _: redis::RedisResult<i64> = conn.xack(stream, CONSUMER_GROUP, &[id]).await;
    }

    async fn publish_response(&self, initiator_machine: &str, response: &CommandResponse) {
        let Ok(body) = serde_json::to_string(response) else {
            return;
        };
        let mut conn = self.conn.lock().unwrap().clone();
        let stream = response_stream_key(initiator_machine);
        let _: redis::RedisResult<String> = conn
            .xadd_maxlen(&stream, redis::streams::StreamMaxlen::Approx(self.cfg.stream_maxlen), "*", &[("payload", body)])
            .await;
    }

    /// Listens on this machine's own response stream and resolves whichever
    /// `send` call is waiting on each correlation id.
    pub async fn run_response_listener(self: Arc<Self>) {
        let stream = response_stream_key(&self.cfg.machine_name);
        let mut last_id = "$".to_string();
        let opts = redis::streams::StreamReadOptions::default().block(5_000);
        loop {
            let reply: redis::RedisResult<redis::streams::StreamReadReply> = {
                let mut conn = self.conn.lock().unwrap().clone();
                conn.xread_options(&[&stream], &[last_id.as_str()], &opts).await
            };
            match reply {
                Ok(reply) => {
                    for key in reply.keys {
                        for entry in key.ids {
                            last_id = entry.id.clone();
                            let Some(redis::Value::BulkString(raw)) = entry.map.get("payload") else {
                                continue;
                            };
                            let Ok(response) = serde_json::from_slice::<CommandResponse>(raw) else {
                                continue;
                            };
                            if let Some((_, tx)) = self.pending.remove(&response.correlation_id) {
                                let _ = tx.send(response);
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "response stream read failed, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

/// Helper used by `CommandBus::send` callers that need a plain map of
/// arguments rather than a pre-built `serde_json::Value`.
pub fn arguments_from(map: HashMap<&'static str, serde_json::Value>) -> serde_json::Value {
    serde_json::to_value(map).unwrap_or(serde_json::Value::Null)
}
