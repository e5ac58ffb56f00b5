//! Shared data types for teleclaude-terminal.

use serde::{Deserialize, Serialize};
use teleclaude_core::SessionId;

/// Shells whose foreground-process name marks a pane as "ready" for the
/// next completion sentinel (spec §4.1's shell-readiness allow-list).
/// Resolved narrowly per `DESIGN.md` Open Question 1 — no attempt is made
/// to special-case `PROMPT_COMMAND` wrappers or unusual shells.
pub const READY_SHELLS: &[&str] = &["bash", "zsh", "fish", "sh", "dash"];

/// A `signal()` request understood by the Terminal Bridge (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaneSignal {
    /// Ctrl-C.
    Interrupt,
    /// Ctrl-C twice in quick succession — used to break out of a REPL that
    /// swallows a single interrupt.
    DoubleInterrupt,
    /// Clear the visible screen without affecting the running process.
    Clear,
}

/// Cols x rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaneSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for PaneSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Snapshot of a pane's visible + scrollback capture, used by the Output
/// Pipeline to diff against the last-forwarded baseline (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaneSnapshot {
    pub session_id: SessionId,
    pub bytes: String,
}

/// Metadata snapshot for a live pane, returned by `TerminalManager::list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaneInfo {
    pub session_id: SessionId,
    pub shell: String,
    pub cwd: String,
    pub created_at: u64,
    pub is_alive: bool,
}

/// Outcome of appending (or withholding) a completion sentinel to outgoing
/// text, driven by shell-readiness (spec §4.1 "corrected design").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelDecision {
    pub append: bool,
    /// The nonce embedded in the sentinel, when one was appended — the
    /// poller watches for `__EXIT__<nonce>__<code>__` in the next capture.
    pub nonce: Option<String>,
}
