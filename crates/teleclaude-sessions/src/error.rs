use teleclaude_core::{Classify, ErrorKind};
use thiserror::Error;

/// Errors from the Session Store and Session Manager (spec §4.4).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested session does not exist.
    #[error("session not found: {0}")]
    NotFound(String),

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored column could not be decoded back into its typed form
    /// (corrupt row, or a schema/enum mismatch from an older build).
    #[error("corrupt session row: {0}")]
    Corrupt(String),

    /// Sticky-set addition attempted past the cap of 5 (spec §4.4 — this is
    /// a silent refusal at the caller level; the manager surfaces it so the
    /// caller can decide whether to log it).
    #[error("sticky set is full (max {cap})")]
    StickySetFull { cap: usize },

    /// A top-level operation was rejected because the session is already
    /// inside an active gathering or escalation relay (spec §4.4 nested
    /// guard).
    #[error("session {0} already has an active gathering or relay")]
    NestedGuard(String),
}

impl Classify for SessionError {
    fn classify(&self) -> ErrorKind {
        match self {
            SessionError::NotFound(_) => ErrorKind::NotFound,
            SessionError::Database(_) => ErrorKind::TransientTransport,
            SessionError::Corrupt(_) => ErrorKind::StaleState,
            SessionError::StickySetFull { .. } => ErrorKind::InvalidInput,
            SessionError::NestedGuard(_) => ErrorKind::ContractViolation,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
