//! `Pane` — a persistent multiplexer pane wrapping one `portable-pty` child,
//! plus the shell-readiness sentinel logic from spec §4.1.
//!
//! Each `Pane` owns a dedicated OS reader thread draining the master
//! read-end into an ANSI-stripped capture buffer, matching the teacher's
//! `PtySession` shape. `capture_pane` snapshots the buffer instead of
//! draining it — the Output Pipeline (`output.rs`) owns baseline tracking
//! and diffing, so the pane itself stays a dumb byte source.

use crate::error::{Result, TerminalError};
use crate::types::{PaneSignal, PaneSize, SentinelDecision, READY_SHELLS};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Maximum bytes kept in the capture ring buffer (256 KiB).
const CAPTURE_BUF_MAX: usize = 262_144;

pub struct Pane {
    pub shell: String,
    pub cwd: String,
    pub created_at: u64,
    writer: Mutex<Box<dyn Write + Send>>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    child_pid: Option<u32>,
    capture_buf: Arc<Mutex<String>>,
    alive: Arc<AtomicBool>,
}

impl Pane {
    /// `ensure_pane` is idempotent at the manager level; this constructor is
    /// the "create if absent" half — always spawns a fresh pane.
    pub fn spawn(shell: &str, cwd: &str) -> Result<Self> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TerminalError::PtySpawn(e.to_string()))?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.cwd(cwd);

        let child: Box<dyn Child + Send + Sync> = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| TerminalError::PtySpawn(e.to_string()))?;
        let child_pid = child.process_id();
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| TerminalError::PtySpawn(e.to_string()))?;

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| TerminalError::PtySpawn(e.to_string()))?;

        let capture_buf: Arc<Mutex<String>> = Arc::new(Mutex::new(String::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let buf_clone = Arc::clone(&capture_buf);
        let alive_clone = Arc::clone(&alive);

        std::thread::spawn(move || {
            let mut raw = [0u8; 4096];
            loop {
                match reader.read(&mut raw) {
                    Ok(0) => break,
                    Ok(n) => {
                        let clean = strip_ansi_escapes::strip(&raw[..n]);
                        let text = String::from_utf8_lossy(&clean).into_owned();
                        let mut guard = buf_clone.lock().unwrap();
                        guard.push_str(&text);
                        if guard.len() > CAPTURE_BUF_MAX {
                            let excess = guard.len() - CAPTURE_BUF_MAX;
                            guard.drain(..excess);
                        }
                    }
                    Err(_) => break,
                }
            }
            alive_clone.store(false, Ordering::Release);
        });

        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Ok(Self {
            shell: shell.to_string(),
            cwd: cwd.to_string(),
            created_at,
            writer: Mutex::new(writer),
            master: Mutex::new(pair.master),
            child_pid,
            capture_buf,
            alive,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Query the current foreground process name via the master PTY's
    /// controlling-terminal foreground process group (`process_group_leader`),
    /// then `/proc/<pgid>/comm` on Linux. Returns `None` on any failure —
    /// callers default to "ready" per spec §4.1 ("On detection failure...
    /// default to ready").
    #[cfg(target_os = "linux")]
    fn foreground_process_name(&self) -> Option<String> {
        let master = self.master.lock().ok()?;
        let pgid = master.process_group_leader()?;
        if pgid <= 0 {
            return None;
        }
        let comm_path = format!("/proc/{pgid}/comm");
        std::fs::read_to_string(comm_path)
            .ok()
            .map(|s| s.trim().to_string())
    }

    #[cfg(not(target_os = "linux"))]
    fn foreground_process_name(&self) -> Option<String> {
        None
    }

    /// Decide whether `text` should receive a completion sentinel, per the
    /// shell-readiness rule in spec §4.1.
    ///
    /// - If the foreground process query fails, default to "ready" (append).
    /// - If the pane is ready AND `text` does not itself start one of the
    ///   `READY_SHELLS` (which would echo the sentinel prematurely), append.
    /// - Otherwise, withhold the sentinel — this covers both "pane busy with
    ///   an interactive program" and "text starts a nested shell".
    pub fn decide_sentinel(&self, text: &str) -> SentinelDecision {
        let ready = match self.foreground_process_name() {
            Some(name) => READY_SHELLS.contains(&name.as_str()),
            None => true,
        };

        if !ready {
            return SentinelDecision {
                append: false,
                nonce: None,
            };
        }

        if starts_new_shell(text) {
            return SentinelDecision {
                append: false,
                nonce: None,
            };
        }

        SentinelDecision {
            append: true,
            nonce: Some(Uuid::new_v4().simple().to_string()),
        }
    }

    /// Inject `text` verbatim, optionally appending the generated completion
    /// sentinel. Background jobs (`&`) still get the sentinel — it signals
    /// spawn success, not job completion (spec §4.1, Open Question 2).
    pub fn send_text(&self, text: &str, append_marker: bool) -> Result<Option<String>> {
        let decision = if append_marker {
            self.decide_sentinel(text)
        } else {
            SentinelDecision {
                append: false,
                nonce: None,
            }
        };

        let payload = if decision.append {
            let nonce = decision.nonce.clone().unwrap();
            format!("{text} ; printf '__EXIT__{nonce}__%s__' \"$?\"\n")
        } else if text.ends_with('\n') {
            text.to_string()
        } else {
            format!("{text}\n")
        };

        let mut guard = self.writer.lock().unwrap();
        guard.write_all(payload.as_bytes())?;
        guard.flush()?;
        Ok(decision.nonce)
    }

    /// Snapshot the visible + scrollback capture buffer without draining it.
    pub fn capture(&self) -> String {
        self.capture_buf.lock().unwrap().clone()
    }

    pub fn signal(&self, signal: PaneSignal) -> Result<()> {
        let bytes: &[u8] = match signal {
            PaneSignal::Interrupt => b"\x03",
            PaneSignal::DoubleInterrupt => b"\x03\x03",
            PaneSignal::Clear => b"\x0c",
        };
        let mut guard = self.writer.lock().unwrap();
        guard.write_all(bytes)?;
        guard.flush()?;
        Ok(())
    }

    pub fn resize(&self, size: PaneSize) -> Result<()> {
        let guard = self.master.lock().unwrap();
        guard
            .resize(PtySize {
                rows: size.rows,
                cols: size.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TerminalError::TransportError(e.to_string()))
    }

    pub fn child_pid(&self) -> Option<u32> {
        self.child_pid
    }
}

/// Whether `text` would itself launch one of `READY_SHELLS` as its first
/// token — appending a sentinel in that case would have the *new* shell
/// echo it before the user's interactive session has even started.
fn starts_new_shell(text: &str) -> bool {
    let first_token = text.trim_start().split_whitespace().next().unwrap_or("");
    let name = first_token.rsplit('/').next().unwrap_or(first_token);
    READY_SHELLS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_new_shell_detects_bare_name() {
        assert!(starts_new_shell("bash"));
        assert!(starts_new_shell("  zsh --login"));
        assert!(starts_new_shell("/usr/bin/fish"));
    }

    #[test]
    fn starts_new_shell_rejects_ordinary_commands() {
        assert!(!starts_new_shell("ls -la"));
        assert!(!starts_new_shell("bashful-script.sh"));
    }
}
