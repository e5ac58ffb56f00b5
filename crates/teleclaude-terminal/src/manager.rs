//! `TerminalManager` — owns and multiplexes every active pane.
//!
//! Callers interact exclusively through this struct, normally behind
//! `tokio::sync::Mutex<TerminalManager>` shared via `Arc` the way the
//! teacher's `AppState` holds its `TerminalManager`.

use std::collections::HashMap;

use teleclaude_core::SessionId;
use tracing::info;

use crate::error::{Result, TerminalError};
use crate::pane::Pane;
use crate::types::{PaneInfo, PaneSignal, PaneSize};

pub struct TerminalManager {
    panes: HashMap<SessionId, Pane>,
}

impl TerminalManager {
    pub fn new() -> Self {
        Self {
            panes: HashMap::new(),
        }
    }

    /// Create the pane for `session_id` if one is not already open.
    /// Idempotent — a pane already present is left untouched.
    pub fn ensure_pane(&mut self, session_id: &SessionId, shell: &str, cwd: &str) -> Result<()> {
        if let Some(existing) = self.panes.get(session_id) {
            if existing.is_alive() {
                return Ok(());
            }
            self.panes.remove(session_id);
        }
        let pane = Pane::spawn(shell, cwd)?;
        info!("ensure_pane created pane for session {session_id} (shell={shell}, cwd={cwd})");
        self.panes.insert(session_id.clone(), pane);
        Ok(())
    }

    /// Inject `text`, optionally appending the shell-readiness completion
    /// sentinel. Returns the nonce when one was appended, for the caller to
    /// watch for in subsequent captures.
    pub fn send_text(
        &self,
        session_id: &SessionId,
        text: &str,
        append_marker: bool,
    ) -> Result<Option<String>> {
        self.get_pane(session_id)?.send_text(text, append_marker)
    }

    /// Snapshot the pane's capture buffer (visible + scrollback) without
    /// draining it — the Output Pipeline owns baseline diffing.
    pub fn capture_pane(&self, session_id: &SessionId) -> Result<String> {
        Ok(self.get_pane(session_id)?.capture())
    }

    pub fn signal(&self, session_id: &SessionId, signal: PaneSignal) -> Result<()> {
        self.get_pane(session_id)?.signal(signal)
    }

    pub fn resize(&self, session_id: &SessionId, size: PaneSize) -> Result<()> {
        self.get_pane(session_id)?.resize(size)
    }

    /// Remove and terminate the pane for `session_id`, if any.
    pub fn close_pane(&mut self, session_id: &SessionId) -> Result<()> {
        if let Some(pane) = self.panes.get(session_id) {
            let _ = pane.signal(PaneSignal::Interrupt);
        }
        self.panes.remove(session_id);
        Ok(())
    }

    pub fn list(&self) -> Vec<PaneInfo> {
        self.panes
            .iter()
            .map(|(id, p)| PaneInfo {
                session_id: id.clone(),
                shell: p.shell.clone(),
                cwd: p.cwd.clone(),
                created_at: p.created_at,
                is_alive: p.is_alive(),
            })
            .collect()
    }

    pub fn has_pane(&self, session_id: &SessionId) -> bool {
        self.panes.get(session_id).is_some_and(Pane::is_alive)
    }

    fn get_pane(&self, session_id: &SessionId) -> Result<&Pane> {
        self.panes
            .get(session_id)
            .filter(|p| p.is_alive())
            .ok_or_else(|| TerminalError::PaneMissing(session_id.to_string()))
    }
}

impl Default for TerminalManager {
    fn default() -> Self {
        Self::new()
    }
}
