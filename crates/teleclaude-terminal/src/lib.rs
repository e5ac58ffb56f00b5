//! teleclaude-terminal — the Session & Terminal Bridge (spec §4.1, §4.2).
//!
//! Owns one persistent multiplexer pane per session and the output pipeline
//! that turns its raw byte stream into dual-rendered deltas and activity
//! transitions. Callers outside this crate never touch a `Pane` directly —
//! they go through `TerminalManager` and `OutputScheduler`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use teleclaude_terminal::manager::TerminalManager;
//! use teleclaude_terminal::output::OutputScheduler;
//! use tokio::sync::Mutex;
//!
//! # async fn run(session_id: teleclaude_core::SessionId) -> teleclaude_terminal::Result<()> {
//! let terminal = Arc::new(Mutex::new(TerminalManager::new()));
//! terminal.lock().await.ensure_pane(&session_id, "bash", "/tmp")?;
//! terminal.lock().await.send_text(&session_id, "echo hi", true)?;
//!
//! let (scheduler, mut deltas, mut activity) = OutputScheduler::new(terminal, 32, 1000);
//! let mut seq = 0u64;
//! scheduler.start(session_id, move || { seq += 1; seq }).await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod manager;
pub mod output;
pub mod pane;
pub mod truncate;
pub mod types;

pub use error::{Result, TerminalError};
pub use manager::TerminalManager;
pub use output::{ActivityEvent, ActivityState, HookEvent, OutputDelta, OutputScheduler};
pub use pane::Pane;
pub use types::{PaneInfo, PaneSignal, PaneSize, PaneSnapshot, SentinelDecision, READY_SHELLS};
