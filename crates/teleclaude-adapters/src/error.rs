use teleclaude_core::{Classify, ErrorKind};
use thiserror::Error;

/// Errors raised by UCAP and by individual `Adapter` implementations.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{adapter}: connection failed: {cause}")]
    ConnectionFailed { adapter: String, cause: String },

    #[error("{adapter}: send failed: {cause}")]
    SendFailed { adapter: String, cause: String },

    #[error("{adapter}: authentication failed: {cause}")]
    AuthFailed { adapter: String, cause: String },

    #[error("{adapter}: operation timed out after {ms}ms")]
    Timeout { adapter: String, ms: u64 },

    #[error("{adapter}: configuration error: {cause}")]
    ConfigError { adapter: String, cause: String },

    /// The target session is unknown or closed. `send_message` treats this
    /// as "silently drop with a log" per spec §4.3, not a propagated error.
    #[error("unknown or closed session: {0}")]
    SessionNotFound(String),

    /// A registered handler returned an error while processing a dispatch.
    #[error("handler error: {0}")]
    HandlerError(String),
}

impl Classify for AdapterError {
    fn classify(&self) -> ErrorKind {
        match self {
            AdapterError::ConnectionFailed { .. } => ErrorKind::TransientTransport,
            AdapterError::SendFailed { .. } => ErrorKind::TransientTransport,
            AdapterError::AuthFailed { .. } => ErrorKind::InvalidInput,
            AdapterError::Timeout { .. } => ErrorKind::TransientTransport,
            AdapterError::ConfigError { .. } => ErrorKind::InvalidInput,
            AdapterError::SessionNotFound(_) => ErrorKind::NotFound,
            AdapterError::HandlerError(_) => ErrorKind::ContractViolation,
        }
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
