use teleclaude_core::{Classify, ErrorKind};
use thiserror::Error;

/// Errors from the Cross-Machine Transport and Tool Server (spec §4.5/§4.6).
#[derive(Debug, Error)]
pub enum MeshError {
    /// Stream server unreachable. Retried with backoff by the owning
    /// publisher/consumer loop; surfaced per-target if it keeps failing.
    #[error("stream transport error: {0}")]
    StreamTransport(#[from] redis::RedisError),

    /// The target machine has no fresh heartbeat — classified "peer
    /// offline" per spec §8 scenario 6.
    #[error("peer offline: {0}")]
    PeerOffline(String),

    /// Cross-machine command dispatch exceeded its configured timeout.
    #[error("command to {machine} timed out after {timeout_secs}s")]
    CommandTimeout { machine: String, timeout_secs: u64 },

    /// Malformed request on the tool socket.
    #[error("invalid tool request: {0}")]
    InvalidRequest(String),

    /// The caller's role excludes this tool (spec §4.6 role gating).
    #[error("operation '{operation}' is not permitted for role '{role}'")]
    RoleDenied { operation: String, role: String },

    /// Unknown session/peer/computer referenced by a tool call.
    #[error("not found: {0}")]
    NotFound(String),

    /// Frame codec or serialization failure on the tool socket.
    #[error("framing error: {0}")]
    Framing(String),
}

impl Classify for MeshError {
    fn classify(&self) -> ErrorKind {
        match self {
            MeshError::StreamTransport(_) => ErrorKind::TransientTransport,
            MeshError::PeerOffline(_) => ErrorKind::TransientTransport,
            MeshError::CommandTimeout { .. } => ErrorKind::TransientTransport,
            MeshError::InvalidRequest(_) => ErrorKind::InvalidInput,
            MeshError::RoleDenied { .. } => ErrorKind::InvalidInput,
            MeshError::NotFound(_) => ErrorKind::NotFound,
            MeshError::Framing(_) => ErrorKind::ContractViolation,
        }
    }
}

pub type Result<T> = std::result::Result<T, MeshError>;
