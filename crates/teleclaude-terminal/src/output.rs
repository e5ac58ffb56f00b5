//! Output Pipeline (spec §4.2) — baseline diff with feedback-loop
//! suppression, dual-mode rendering, and the three activity states.
//!
//! The pipeline does not know about adapters; it hands finished
//! [`OutputDelta`]s and [`ActivityEvent`]s to the owner over unbounded
//! channels. `teleclaude-adapters`' `AdapterClient` is the consumer that
//! turns a delta into a broadcast across every bound adapter — keeping this
//! crate decoupled from UCAP the same way the teacher keeps
//! `skynet-terminal` decoupled from `skynet-channels`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use teleclaude_core::SessionId;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::manager::TerminalManager;

/// Per-session activity/idle state (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    /// User text was just submitted.
    InputHighlight,
    /// A tool invocation is in flight.
    TempOutputHighlight,
    /// The agent turn completed.
    OutputHighlight,
}

/// Hook events emitted by the agent CLI's own lifecycle hooks. Preferred
/// over silence-derived state when available (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    UserPromptSubmit,
    ToolUse,
    ToolDone,
    AgentStop,
    /// Explicit activity-reset token, independent of hook wiring.
    ActivityReset,
}

impl HookEvent {
    fn resulting_state(&self) -> Option<ActivityState> {
        match self {
            HookEvent::UserPromptSubmit => Some(ActivityState::InputHighlight),
            HookEvent::ToolUse => Some(ActivityState::TempOutputHighlight),
            HookEvent::ToolDone => Some(ActivityState::TempOutputHighlight),
            HookEvent::AgentStop => Some(ActivityState::OutputHighlight),
            HookEvent::ActivityReset => None,
        }
    }
}

/// A dual-rendered delta ready for UCAP fan-out.
#[derive(Debug, Clone)]
pub struct OutputDelta {
    pub session_id: SessionId,
    pub seq: u64,
    /// Wrapped, ANSI-colourized (already stripped at capture time), summarised.
    pub human: String,
    /// Precise, whitespace- and newline-preserved.
    pub agent: String,
}

/// Activity/idle transition, surfaced to the Session Store for listings.
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    pub session_id: SessionId,
    pub state: ActivityState,
    /// Set only on `AgentStop` — the summary string stored on the session.
    pub summary: Option<String>,
}

struct PollerHandle {
    cancel: CancellationToken,
}

struct SessionBaseline {
    baseline: String,
    state: ActivityState,
}

/// Bounds the number of concurrently active output pollers and owns the
/// baseline map. One poller per session (spec §5 resource policy).
pub struct OutputScheduler {
    terminal: Arc<Mutex<TerminalManager>>,
    baselines: Arc<Mutex<HashMap<SessionId, SessionBaseline>>>,
    pollers: Arc<Mutex<HashMap<SessionId, PollerHandle>>>,
    concurrency: Arc<Semaphore>,
    delta_tx: mpsc::UnboundedSender<OutputDelta>,
    activity_tx: mpsc::UnboundedSender<ActivityEvent>,
    poll_interval: Duration,
}

impl OutputScheduler {
    pub fn new(
        terminal: Arc<Mutex<TerminalManager>>,
        max_concurrent_pollers: usize,
        poll_interval_ms: u64,
    ) -> (Self, mpsc::UnboundedReceiver<OutputDelta>, mpsc::UnboundedReceiver<ActivityEvent>) {
        let (delta_tx, delta_rx) = mpsc::unbounded_channel();
        let (activity_tx, activity_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            terminal,
            baselines: Arc::new(Mutex::new(HashMap::new())),
            pollers: Arc::new(Mutex::new(HashMap::new())),
            concurrency: Arc::new(Semaphore::new(max_concurrent_pollers)),
            delta_tx,
            activity_tx,
            poll_interval: Duration::from_millis(poll_interval_ms),
        };
        (scheduler, delta_rx, activity_rx)
    }

    /// Start (or no-op if already running) the poller for `session_id`.
    pub async fn start(&self, session_id: SessionId, mut next_seq: impl FnMut() -> u64 + Send + 'static) {
        let mut pollers = self.pollers.lock().await;
        if pollers.contains_key(&session_id) {
            return;
        }
        let cancel = CancellationToken::new();
        pollers.insert(
            session_id.clone(),
            PollerHandle {
                cancel: cancel.clone(),
            },
        );
        drop(pollers);

        let terminal = Arc::clone(&self.terminal);
        let baselines = Arc::clone(&self.baselines);
        let delta_tx = self.delta_tx.clone();
        let activity_tx = self.activity_tx.clone();
        let concurrency = Arc::clone(&self.concurrency);
        let interval = self.poll_interval;
        let sid = session_id.clone();

        tokio::spawn(async move {
            let _permit = match concurrency.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("output poller for {sid} cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let capture = {
                            let guard = terminal.lock().await;
                            guard.capture_pane(&sid)
                        };
                        let Ok(capture) = capture else {
                            continue;
                        };
                        let mut map = baselines.lock().await;
                        let entry = map.entry(sid.clone()).or_insert_with(|| SessionBaseline {
                            baseline: String::new(),
                            state: ActivityState::OutputHighlight,
                        });
                        if let Some(delta_text) = diff_against_baseline(&entry.baseline, &capture) {
                            entry.baseline = capture.clone();
                            let seq = next_seq();
                            let human = render_human(&delta_text);
                            let agent = delta_text.clone();
                            let _ = delta_tx.send(OutputDelta {
                                session_id: sid.clone(),
                                seq,
                                human,
                                agent,
                            });
                            let _ = activity_tx.send(ActivityEvent {
                                session_id: sid.clone(),
                                state: entry.state,
                                summary: None,
                            });
                        }
                    }
                }
            }
        });
    }

    /// Cancel the poller; the last baseline stays in the map so resumption
    /// does not double-deliver (spec §4.2 concurrency note).
    pub async fn stop(&self, session_id: &SessionId) {
        if let Some(handle) = self.pollers.lock().await.remove(session_id) {
            handle.cancel.cancel();
        }
    }

    /// Reset the baseline to the current capture immediately after an
    /// injection (e.g. Help-Desk Relay handback), so the injected text is
    /// not mistaken for the session's own output on the next tick.
    pub async fn reset_baseline_after_injection(&self, session_id: &SessionId) {
        let capture = {
            let guard = self.terminal.lock().await;
            guard.capture_pane(session_id)
        };
        if let Ok(capture) = capture {
            let mut map = self.baselines.lock().await;
            map.insert(
                session_id.clone(),
                SessionBaseline {
                    baseline: capture,
                    state: ActivityState::OutputHighlight,
                },
            );
        }
    }

    /// Apply a hook-driven (or silence-derived, by the caller) activity
    /// transition and, on `AgentStop`, stamp a summary.
    pub async fn apply_hook(&self, session_id: &SessionId, event: HookEvent, summary: Option<String>) {
        if let Some(state) = event.resulting_state() {
            let mut map = self.baselines.lock().await;
            if let Some(entry) = map.get_mut(session_id) {
                entry.state = state;
            }
            if matches!(event, HookEvent::AgentStop) {
                let _ = self.activity_tx.send(ActivityEvent {
                    session_id: session_id.clone(),
                    state,
                    summary,
                });
            }
        }
    }
}

/// `None` if `capture` has not grown past `baseline` (nothing new); the
/// suffix otherwise. If `capture` does not start with `baseline` (the pane
/// was cleared or reset underneath us), the whole capture is treated as new.
fn diff_against_baseline(baseline: &str, capture: &str) -> Option<String> {
    if capture.len() <= baseline.len() {
        if capture == baseline {
            return None;
        }
        return Some(capture.to_string());
    }
    if let Some(rest) = capture.strip_prefix(baseline) {
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    } else {
        Some(capture.to_string())
    }
}

/// Human-readable rendering: collapse runs of blank lines, trim trailing
/// whitespace per line, and apply middle-omission truncation for very long
/// deltas. The agent-mode rendering is the raw delta, untouched, so
/// automated callers see exact bytes.
fn render_human(delta: &str) -> String {
    let mut out = String::with_capacity(delta.len());
    let mut blank_run = 0;
    for line in delta.split('\n') {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    crate::truncate::truncate_output(&out, crate::truncate::DEFAULT_MAX_CHARS)
}

impl std::fmt::Debug for OutputScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputScheduler").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_returns_none_when_unchanged() {
        assert_eq!(diff_against_baseline("abc", "abc"), None);
    }

    #[test]
    fn diff_returns_suffix_when_appended() {
        assert_eq!(
            diff_against_baseline("abc", "abcdef"),
            Some("def".to_string())
        );
    }

    #[test]
    fn diff_treats_shrink_as_full_reset() {
        assert_eq!(diff_against_baseline("abcdef", "xy"), Some("xy".to_string()));
    }

    #[test]
    fn render_human_collapses_blank_runs() {
        let rendered = render_human("a\n\n\n\nb\n");
        assert_eq!(rendered, "a\n\nb\n");
    }
}
