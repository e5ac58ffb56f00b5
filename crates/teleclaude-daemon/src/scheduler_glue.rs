//! Session lifecycle timers (spec §4.4): the daemon-side consumer of the
//! scheduler's two recurring sweeps, matching `job.action` against the
//! constants `teleclaude-scheduler` defines without knowing what a
//! "session" is.

use std::sync::Arc;

use serde_json::json;
use teleclaude_events::producer::EventProducer;
use teleclaude_events::types::{EventLevel, Visibility};
use teleclaude_scheduler::{Job, ACTION_CUSTOMER_SWEEP, ACTION_IDLE_TIMEOUT_SWEEP};
use teleclaude_sessions::SessionManager;
use teleclaude_terminal::TerminalManager;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct SchedulerGlue {
    sessions: Arc<SessionManager>,
    terminal: Arc<tokio::sync::Mutex<TerminalManager>>,
    events: Arc<EventProducer>,
    idle_timeout_secs: i64,
    customer_sweep_secs: i64,
}

impl SchedulerGlue {
    pub fn new(
        sessions: Arc<SessionManager>,
        terminal: Arc<tokio::sync::Mutex<TerminalManager>>,
        events: Arc<EventProducer>,
        idle_timeout_secs: i64,
        customer_sweep_secs: i64,
    ) -> Self {
        Self { sessions, terminal, events, idle_timeout_secs, customer_sweep_secs }
    }

    pub async fn run(self: Arc<Self>, mut fired: mpsc::Receiver<Job>) {
        while let Some(job) = fired.recv().await {
            match job.action.as_str() {
                ACTION_IDLE_TIMEOUT_SWEEP => self.run_idle_sweep().await,
                ACTION_CUSTOMER_SWEEP => self.run_customer_sweep().await,
                other => warn!(action = other, "scheduler fired an action with no registered handler"),
            }
        }
    }

    /// Admin sessions idle past the timeout: extract memory, inject
    /// `/compact`, then reset activity so the cooldown restarts clean
    /// (spec §4.4).
    async fn run_idle_sweep(&self) {
        let candidates = match self.sessions.list_idle_candidates(self.idle_timeout_secs) {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "idle sweep candidate lookup failed");
                return;
            }
        };

        for session in candidates {
            if let Err(err) = self.sessions.record_memory_extraction(&session.id) {
                warn!(session_id = %session.id, error = %err, "failed to record memory extraction");
                continue;
            }

            self.events
                .emit(
                    "session.idle_compacted",
                    EventLevel::Operational,
                    "session",
                    session.id.as_str(),
                    "An idle session was compacted",
                    json!({"session_id": session.id.as_str()}),
                    Visibility::Local,
                )
                .await
                .ok();

            {
                let terminal = self.terminal.lock().await;
                if let Err(err) = terminal.send_text(&session.id, "/compact\n", false) {
                    warn!(session_id = %session.id, error = %err, "failed to inject /compact");
                    continue;
                }
            }

            if let Err(err) = self.sessions.mark_idle_compacted(&session.id) {
                warn!(session_id = %session.id, error = %err, "failed to mark session idle-compacted");
                continue;
            }
            if let Err(err) = self.sessions.touch_activity(&session.id, None) {
                warn!(session_id = %session.id, error = %err, "failed to reset activity after compaction");
            }
            info!(session_id = %session.id, "idle session compacted");
        }
    }

    /// Customer sessions idle past the 72-hour sweep window are closed
    /// outright — they never idle-compact (spec §4.4).
    async fn run_customer_sweep(&self) {
        let candidates = match self.sessions.list_customer_sweep_candidates(self.customer_sweep_secs) {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "customer sweep candidate lookup failed");
                return;
            }
        };

        for session in candidates {
            {
                let mut terminal = self.terminal.lock().await;
                if let Err(err) = terminal.close_pane(&session.id) {
                    warn!(session_id = %session.id, error = %err, "failed to close pane during customer sweep");
                }
            }
            if let Err(err) = self.sessions.close(&session.id) {
                warn!(session_id = %session.id, error = %err, "failed to close session during customer sweep");
                continue;
            }

            self.events
                .emit(
                    "session.closed",
                    EventLevel::Operational,
                    "session",
                    session.id.as_str(),
                    "A customer session was closed by the inactivity sweep",
                    json!({"session_id": session.id.as_str(), "closed_at": chrono::Utc::now().to_rfc3339()}),
                    Visibility::Local,
                )
                .await
                .ok();
            info!(session_id = %session.id, "customer session closed by sweep");
        }
    }
}
