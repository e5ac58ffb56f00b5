use rusqlite::{Connection, Result};

/// Initialise the notification store's tables. Safe to call on every
/// startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_notifications_table(conn)
}

fn create_notifications_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS notifications (
            id              TEXT PRIMARY KEY,
            event_type      TEXT NOT NULL,
            version         INTEGER NOT NULL,
            source          TEXT NOT NULL,
            level           TEXT NOT NULL,
            domain          TEXT NOT NULL,
            visibility      TEXT NOT NULL,
            entity          TEXT NOT NULL,
            description     TEXT NOT NULL,
            payload         TEXT NOT NULL,
            idempotency_key TEXT NOT NULL UNIQUE,
            group_key       TEXT,
            human_status    TEXT NOT NULL DEFAULT 'unseen',
            agent_status    TEXT NOT NULL DEFAULT 'none',
            agent_id        TEXT,
            resolution      TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            seen_at         TEXT,
            claimed_at      TEXT,
            resolved_at     TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_group
            ON notifications(group_key);
        CREATE INDEX IF NOT EXISTS idx_notifications_human_status
            ON notifications(human_status, created_at DESC);",
    )
}
