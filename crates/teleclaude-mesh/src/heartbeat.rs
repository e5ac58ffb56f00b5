use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use teleclaude_core::config::MeshConfig;
use tracing::{debug, warn};

use crate::error::Result;
use crate::peers::PeerRegistry;
use crate::types::HeartbeatPayload;

const HEARTBEAT_STREAM_KEY: &str = "heartbeat";

/// Publishes this machine's heartbeat to the shared stream on a fixed
/// interval, trimmed to `stream_maxlen` so the stream never grows unbounded
/// (spec §4.5).
pub async fn run_publisher(conn: ConnectionManager, cfg: Arc<MeshConfig>, user: String, host: String, transport_binary_path: String) {
    let mut conn = conn;
    let interval = Duration::from_secs(cfg.heartbeat_interval_secs.max(1));
    loop {
        let payload = HeartbeatPayload {
            machine_name: cfg.machine_name.clone(),
            user: user.clone(),
            host: host.clone(),
            transport_binary_path: transport_binary_path.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(err) = publish_once(&mut conn, &cfg, &payload).await {
            warn!(error = %err, "heartbeat publish failed, will retry next tick");
        }
        tokio::time::sleep(interval).await;
    }
}

async fn publish_once(conn: &mut ConnectionManager, cfg: &MeshConfig, payload: &HeartbeatPayload) -> Result<()> {
    let body = serde_json::to_string(payload).map_err(|e| crate::error::MeshError::Framing(e.to_string()))?;
    let _: String = conn
        .xadd_maxlen(
            HEARTBEAT_STREAM_KEY,
            redis::streams::StreamMaxlen::Approx(cfg.stream_maxlen),
            "*",
            &[("payload", body)],
        )
        .await?;
    Ok(())
}

/// Consumes the heartbeat stream from the last-seen id forward, updating
/// `registry` and skipping entries this machine emitted itself (spec §4.5
/// "consumers skip entries they emitted themselves").
pub async fn run_consumer(conn: ConnectionManager, cfg: Arc<MeshConfig>, registry: Arc<PeerRegistry>) {
    let mut conn = conn;
    let mut last_id = "$".to_string();
    let opts = redis::streams::StreamReadOptions::default().block(5_000);
    loop {
        let reply: redis::RedisResult<redis::streams::StreamReadReply> =
            conn.xread_options(&[HEARTBEAT_STREAM_KEY], &[last_id.as_str()], &opts).await;
        match reply {
            Ok(reply) => {
                for key in reply.keys {
                    for entry in key.ids {
                        last_id = entry.id.clone();
                        let Some(redis::Value::BulkString(raw)) = entry.map.get("payload") else {
                            continue;
                        };
                        let Ok(payload) = serde_json::from_slice::<HeartbeatPayload>(raw) else {
                            continue;
                        };
                        if payload.machine_name == cfg.machine_name {
                            continue;
                        }
                        debug!(machine = %payload.machine_name, "observed heartbeat");
                        registry.observe(&payload);
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "heartbeat consumer read failed, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
        registry.sweep_expired();
    }
}
