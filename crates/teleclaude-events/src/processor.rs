use std::sync::{Arc, Mutex};
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use teleclaude_core::config::MeshConfig;
use tracing::{debug, error, warn};

use crate::cartridge::{Cartridge, NotificationProjectorCartridge};
use crate::delivery::DeliveryHub;
use crate::producer::EVENTS_STREAM_KEY;
use crate::types::{CartridgeOutcome, EventEnvelope};

const CONSUMER_GROUP: &str = "event-processor";

/// Consumes the shared `events` stream, runs each envelope through the
/// cartridge chain, projects the result into the notification store, and
/// fans out push callbacks. One instance runs per machine (spec §4.8);
/// the consumer group means every machine sees every event exactly once
/// across the cluster, with crash-recovery via the PEL the same way
/// `teleclaude-mesh`'s command bus recovers its own stream.
pub struct EventProcessor {
    conn: Mutex<ConnectionManager>,
    cfg: Arc<MeshConfig>,
    dedup: Arc<dyn Cartridge>,
    projector: Arc<NotificationProjectorCartridge>,
    delivery: Arc<DeliveryHub>,
}

impl EventProcessor {
    pub fn new(conn: ConnectionManager, cfg: Arc<MeshConfig>, dedup: Arc<dyn Cartridge>, projector: Arc<NotificationProjectorCartridge>, delivery: Arc<DeliveryHub>) -> Arc<Self> {
        Arc::new(Self {
            conn: Mutex::new(conn),
            cfg,
            dedup,
            projector,
            delivery,
        })
    }

    pub async fn run(self: Arc<Self>) {
        {
            let mut conn = self.conn.lock().unwrap().clone();
            let created: redis::RedisResult<()> = conn.xgroup_create_mkstream(EVENTS_STREAM_KEY, CONSUMER_GROUP, "0").await;
            if let Err(err) = created {
                debug!(error = %err, "events consumer group already exists or stream init failed");
            }
        }

        let consumer_name = format!("{}-{}", self.cfg.machine_name, std::process::id());

        // PEL recovery pass before live reads, same ordering as the mesh
        // command bus's crash-recovery requirement.
        self.drain_with_id(&consumer_name, "0").await;

        loop {
            self.drain_with_id(&consumer_name, ">").await;
        }
    }

    async fn drain_with_id(&self, consumer_name: &str, start_id: &str) {
        let opts = redis::streams::StreamReadOptions::default().group(CONSUMER_GROUP, consumer_name).count(16).block(if start_id == ">" { 5_000 } else { 0 });
        let reply: redis::RedisResult<redis::streams::StreamReadReply> = {
            let mut conn = self.conn.lock().unwrap().clone();
            conn.xread_options(&[EVENTS_STREAM_KEY], &[start_id], &opts).await
        };
        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "events stream read failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                return;
            }
        };

        for key in reply.keys {
            for entry in key.ids {
                let Some(redis::Value::BulkString(raw)) = entry.map.get("payload") else {
                    continue;
                };
                let envelope: EventEnvelope = match serde_json::from_slice(raw) {
                    Ok(e) => e,
                    Err(err) => {
                        // Schema-mismatched envelope: a contract violation
                        // (spec §4.8/§7). Leave unacked so the PEL preserves
                        // it for retry rather than silently dropping it.
                        error!(error = %err, id = %entry.id, "malformed event envelope, leaving for retry");
                        continue;
                    }
                };

                if let Err(err) = self.process_one(envelope).await {
                    // Leave unacked: stays in the PEL and is retried on the
                    // next recovery pass rather than silently lost.
                    warn!(error = %err, id = %entry.id, "event processing failed, leaving for retry");
                    continue;
                }
                self.ack(&entry.id).await;
            }
        }
    }

    async fn process_one(&self, envelope: EventEnvelope) -> crate::error::Result<()> {
        let outcome = self.dedup.process(envelope).await?;
        let envelope = match outcome {
            CartridgeOutcome::Pass(envelope) => envelope,
            CartridgeOutcome::Drop => return Ok(()),
        };

        let callback_args = self.projector.project(&envelope)?;
        if let Some(args) = callback_args {
            self.delivery.notify(args).await;
        }
        Ok(())
    }

    async fn ack(&self, id: &str) {
        let mut conn = self.conn.lock().unwrap().clone();
        let _: redis::RedisResult<i64> = conn.xack(EVENTS_STREAM_KEY, CONSUMER_GROUP, &[id]).await;
    }
}
