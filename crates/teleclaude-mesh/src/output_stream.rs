use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use teleclaude_core::config::MeshConfig;
use tracing::warn;

fn stream_key(session_id: &str) -> String {
    format!("output:{session_id}")
}

/// One chunk of terminal output mirrored to remote machines watching a
/// session over the mesh (spec §4.5 `output:{session}` streams).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputChunk {
    pub session_id: String,
    pub origin_machine: String,
    pub text: String,
    pub seq: u64,
}

/// Publish-only handle used by the Terminal Bridge to mirror output onto
/// the session's stream as it's produced locally.
pub struct OutputPublisher {
    conn: ConnectionManager,
    cfg: Arc<MeshConfig>,
}

impl OutputPublisher {
    pub fn new(conn: ConnectionManager, cfg: Arc<MeshConfig>) -> Self {
        Self { conn, cfg }
    }

    pub async fn publish(&self, chunk: &OutputChunk) {
        let Ok(body) = serde_json::to_string(chunk) else {
            return;
        };
        let mut conn = self.conn.clone();
        let stream = stream_key(&chunk.session_id);
        let result: redis::RedisResult<String> = conn
            .xadd_maxlen(&stream, redis::streams::StreamMaxlen::Approx(self.cfg.stream_maxlen), "*", &[("payload", body)])
            .await;
        if let Err(err) = result {
            warn!(session_id = %chunk.session_id, error = %err, "failed to mirror output chunk");
        }
    }
}

/// Tails a session's output stream from the current tail forward, for a
/// remote machine subscribing to a session it doesn't own locally.
pub async fn subscribe(conn: ConnectionManager, session_id: String, on_chunk: impl Fn(OutputChunk) + Send + 'static) {
    let mut conn = conn;
    let stream = stream_key(&session_id);
    let mut last_id = "$".to_string();
    let opts = redis::streams::StreamReadOptions::default().block(5_000);
    loop {
        let reply: redis::RedisResult<redis::streams::StreamReadReply> =
            conn.xread_options(&[&stream], &[last_id.as_str()], &opts).await;
        match reply {
            Ok(reply) => {
                for key in reply.keys {
                    for entry in key.ids {
                        last_id = entry.id.clone();
                        let Some(redis::Value::BulkString(raw)) = entry.map.get("payload") else {
                            continue;
                        };
                        if let Ok(chunk) = serde_json::from_slice::<OutputChunk>(raw) {
                            on_chunk(chunk);
                        }
                    }
                }
            }
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "output stream subscribe read failed, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}
