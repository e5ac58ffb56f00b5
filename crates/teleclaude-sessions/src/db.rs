use rusqlite::Connection;

use crate::error::Result;

/// Initialise the sessions and sticky_sessions tables and their indexes.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id                        TEXT PRIMARY KEY,
            machine                   TEXT NOT NULL,
            pane_name                 TEXT NOT NULL,
            project_dir               TEXT NOT NULL,
            agent                     TEXT NOT NULL,
            thinking_mode             TEXT NOT NULL,
            title                     TEXT,
            created_at                TEXT NOT NULL,
            last_activity_at          TEXT NOT NULL,
            last_output_summary       TEXT,
            status                    TEXT NOT NULL,
            adapter_types             TEXT NOT NULL,
            adapter_metadata          TEXT NOT NULL,
            initiator_session_id      TEXT,
            human_role                TEXT NOT NULL,
            human_email               TEXT,
            identity_key              TEXT,
            relay_status              TEXT NOT NULL DEFAULT 'inactive',
            relay_discord_channel_id  TEXT,
            relay_started_at          TEXT,
            native_session_id         TEXT,
            last_memory_extraction_at TEXT,
            help_desk_processed_at    TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_machine
            ON sessions(machine, last_activity_at DESC);
        CREATE INDEX IF NOT EXISTS idx_sessions_status
            ON sessions(status);
        CREATE INDEX IF NOT EXISTS idx_sessions_native
            ON sessions(agent, native_session_id);
        CREATE TABLE IF NOT EXISTS sticky_sessions (
            session_id TEXT PRIMARY KEY,
            added_at   TEXT NOT NULL
        );",
    )?;
    Ok(())
}
