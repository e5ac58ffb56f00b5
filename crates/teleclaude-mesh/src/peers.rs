use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use teleclaude_core::MachineName;
use tracing::debug;

use crate::types::{HeartbeatPayload, Peer, PeerStatus};

/// How long an offline peer is retained for "last seen N ago" UI before it
/// is dropped entirely (spec §4.5 "retained briefly... then dropped").
const RETENTION_MULTIPLIER: u32 = 4;

/// Single-writer (the heartbeat consumer), many-readers peer table. No RPC
/// for peer list — this registry *is* the state (spec §4.5).
pub struct PeerRegistry {
    local: MachineName,
    ttl: Duration,
    peers: RwLock<HashMap<String, Peer>>,
}

impl PeerRegistry {
    /// The local machine is always present (spec §3 Peer invariant), seeded
    /// here so `list()` never needs special-casing it.
    pub fn new(local: MachineName, ttl: Duration, local_user: String, local_host: String, local_transport_binary: String) -> Self {
        let mut peers = HashMap::new();
        peers.insert(
            local.as_str().to_string(),
            Peer {
                machine: local.clone(),
                user: local_user,
                host: local_host,
                transport_binary_path: local_transport_binary,
                last_heartbeat: Instant::now(),
                last_heartbeat_wall: chrono::Utc::now().to_rfc3339(),
            },
        );
        Self {
            local,
            ttl,
            peers: RwLock::new(peers),
        }
    }

    /// Record an observed heartbeat. Self-origin entries (spec §4.5
    /// "consumers skip entries they emitted themselves") still refresh the
    /// local entry's timestamp here — the self-origin *stream* filter lives
    /// in the consumer loop, not the registry.
    pub fn observe(&self, hb: &HeartbeatPayload) {
        let mut peers = self.peers.write().unwrap();
        let entry = peers.entry(hb.machine_name.clone()).or_insert_with(|| Peer {
            machine: MachineName::from(hb.machine_name.clone()),
            user: hb.user.clone(),
            host: hb.host.clone(),
            transport_binary_path: hb.transport_binary_path.clone(),
            last_heartbeat: Instant::now(),
            last_heartbeat_wall: hb.timestamp.clone(),
        });
        entry.user = hb.user.clone();
        entry.host = hb.host.clone();
        entry.transport_binary_path = hb.transport_binary_path.clone();
        entry.last_heartbeat = Instant::now();
        entry.last_heartbeat_wall = hb.timestamp.clone();
    }

    pub fn get(&self, machine: &str) -> Option<Peer> {
        self.peers.read().unwrap().get(machine).cloned()
    }

    pub fn is_online(&self, machine: &str) -> bool {
        self.peers
            .read()
            .unwrap()
            .get(machine)
            .map(|p| p.status(self.ttl) == PeerStatus::Online)
            .unwrap_or(false)
    }

    /// All known peers, online and recently-seen (spec §4.6 `list_computers`).
    pub fn list(&self) -> Vec<(Peer, PeerStatus)> {
        let peers = self.peers.read().unwrap();
        peers.values().map(|p| (p.clone(), p.status(self.ttl))).collect()
    }

    /// Drop peers that have been offline for longer than the retention
    /// window. Never drops the local machine.
    pub fn sweep_expired(&self) {
        let retention = self.ttl * RETENTION_MULTIPLIER;
        let local = self.local.as_str().to_string();
        let mut peers = self.peers.write().unwrap();
        peers.retain(|name, peer| {
            if *name == local {
                return true;
            }
            let keep = peer.last_heartbeat.elapsed() < retention;
            if !keep {
                debug!(machine = %name, "dropping expired peer from registry");
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(machine: &str) -> HeartbeatPayload {
        HeartbeatPayload {
            machine_name: machine.to_string(),
            user: "dev".to_string(),
            host: "10.0.0.1".to_string(),
            transport_binary_path: "/usr/local/bin/teleclaude".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn local_machine_is_always_present() {
        let reg = PeerRegistry::new(MachineName::from("laptop"), Duration::from_secs(30), "dev".into(), "host".into(), "bin".into());
        assert!(reg.get("laptop").is_some());
        assert!(reg.is_online("laptop"));
    }

    #[test]
    fn online_iff_within_ttl() {
        let reg = PeerRegistry::new(MachineName::from("laptop"), Duration::from_millis(50), "dev".into(), "host".into(), "bin".into());
        reg.observe(&payload("desktop"));
        assert!(reg.is_online("desktop"));
        std::thread::sleep(Duration::from_millis(80));
        assert!(!reg.is_online("desktop"));
    }

    #[test]
    fn sweep_never_drops_local() {
        let reg = PeerRegistry::new(MachineName::from("laptop"), Duration::from_millis(10), "dev".into(), "host".into(), "bin".into());
        std::thread::sleep(Duration::from_millis(50));
        reg.sweep_expired();
        assert!(reg.get("laptop").is_some());
    }
}
