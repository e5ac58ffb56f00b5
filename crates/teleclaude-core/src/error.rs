use thiserror::Error;

/// The six error kinds from spec §7. Every crate-local error maps onto one
/// of these so adapters can translate into a transport-appropriate reply
/// (HTTP status, chat error message, tool-call error) without needing to
/// know the originating subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed operation args. Surfaced to caller, never retried.
    InvalidInput,
    /// Unknown session, peer, or notification. Surfaced, not retried.
    NotFound,
    /// Stream server unreachable, adapter rate-limited. Retried with backoff
    /// by the owning component; surfaced per-target if unretryable.
    TransientTransport,
    /// Pane killed, consumer group behind. Component recovers and retries
    /// once; still-failing becomes fatal for the operation.
    StaleState,
    /// Cartridge crash, envelope schema mismatch. Event stays un-ACKed.
    ContractViolation,
    /// Sticky cap, concurrency cap. Silent accept-or-refuse, never raised.
    CeilingBackpressure,
}

impl ErrorKind {
    /// HTTP status code for the REST adapter (§6).
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::TransientTransport => 503,
            ErrorKind::StaleState => 409,
            ErrorKind::ContractViolation => 500,
            ErrorKind::CeilingBackpressure => 429,
        }
    }

    /// Whether the owning component should retry this kind on its own
    /// (never by the caller — see spec §7 "Propagation").
    pub fn retryable(&self) -> bool {
        matches!(self, ErrorKind::TransientTransport | ErrorKind::StaleState)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::TransientTransport => "transient_transport",
            ErrorKind::StaleState => "stale_state",
            ErrorKind::ContractViolation => "contract_violation",
            ErrorKind::CeilingBackpressure => "ceiling_backpressure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error for code that crosses crate boundaries (daemon wiring,
/// tool server). Crate-local errors (`SessionError`, `TerminalError`, …)
/// implement `Classify` and get converted into this at the seam.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{kind}: {message}")]
    Classified { kind: ErrorKind, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Classified {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Classified { kind, .. } => *kind,
            CoreError::Config(_) => ErrorKind::InvalidInput,
            CoreError::Serialization(_) => ErrorKind::ContractViolation,
            CoreError::Io(_) => ErrorKind::TransientTransport,
        }
    }
}

/// Implemented by every crate-local error enum so the daemon and tool
/// server can classify it into one of the six §7 kinds without a giant
/// match spanning every subsystem.
pub trait Classify {
    fn classify(&self) -> ErrorKind;
}

impl Classify for CoreError {
    fn classify(&self) -> ErrorKind {
        self.kind()
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
