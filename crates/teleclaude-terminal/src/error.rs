//! Error types for the teleclaude-terminal crate.

use teleclaude_core::{Classify, ErrorKind};
use thiserror::Error;

/// Errors from the Terminal Bridge (spec §4.1).
#[derive(Debug, Error)]
pub enum TerminalError {
    /// PTY allocation or child-process spawn failed.
    #[error("PTY spawn error: {0}")]
    PtySpawn(String),

    /// The pane has been killed externally. Recoverable: the caller may
    /// recreate it via `ensure_pane` and resume.
    #[error("pane missing for session {0}")]
    PaneMissing(String),

    /// Multiplexer subprocess failure. Fatal for the operation; the session
    /// itself stays alive.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Underlying I/O failure (read, write, flush, resize).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Classify for TerminalError {
    fn classify(&self) -> ErrorKind {
        match self {
            TerminalError::PtySpawn(_) => ErrorKind::TransientTransport,
            TerminalError::PaneMissing(_) => ErrorKind::StaleState,
            TerminalError::TransportError(_) => ErrorKind::TransientTransport,
            TerminalError::IoError(_) => ErrorKind::TransientTransport,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, TerminalError>;
