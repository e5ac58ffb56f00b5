//! Session lifecycle timers (spec §4.4) expressed as scheduler jobs.
//!
//! This crate stays a generic polling scheduler — it does not know what a
//! "session" is. The daemon seeds these two recurring jobs at startup and,
//! on each fired [`crate::Job`], matches `job.action` against the constants
//! below to decide which sweep to run against `teleclaude-sessions`.

use crate::engine::SchedulerHandle;
use crate::error::Result;
use crate::types::Schedule;

/// Fired on the admin idle-timeout cadence. The daemon's handler looks up
/// `SessionManager::list_idle_candidates`, emits a memory-extraction
/// request per session, injects `/compact`, then resets activity.
pub const ACTION_IDLE_TIMEOUT_SWEEP: &str = "session.idle_timeout_sweep";

/// Fired on the 72-hour customer sweep cadence. The daemon's handler looks
/// up `SessionManager::list_customer_sweep_candidates` and closes each one.
pub const ACTION_CUSTOMER_SWEEP: &str = "session.customer_sweep";

/// Seed both session-lifecycle jobs if they are not already present, named
/// uniquely so this is idempotent across restarts.
pub fn register_session_jobs(
    handle: &SchedulerHandle,
    idle_timeout_secs: u64,
    customer_sweep_secs: u64,
) -> Result<()> {
    let existing = handle.list_jobs()?;
    if !existing.iter().any(|j| j.action == ACTION_IDLE_TIMEOUT_SWEEP) {
        handle.add_job(
            "idle-timeout-sweep",
            Schedule::Interval { every_secs: idle_timeout_secs },
            ACTION_IDLE_TIMEOUT_SWEEP,
        )?;
    }
    if !existing.iter().any(|j| j.action == ACTION_CUSTOMER_SWEEP) {
        handle.add_job(
            "customer-sweep",
            Schedule::Interval { every_secs: customer_sweep_secs },
            ACTION_CUSTOMER_SWEEP,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_is_idempotent() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let handle = SchedulerHandle::new(conn).unwrap();
        register_session_jobs(&handle, 1800, 259_200).unwrap();
        register_session_jobs(&handle, 1800, 259_200).unwrap();
        assert_eq!(handle.list_jobs().unwrap().len(), 2);
    }
}
