use rusqlite::Connection;

use crate::error::Result;

/// Initialise the identities table and its lookup index.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS identities (
            identity_key             TEXT PRIMARY KEY,
            platform                 TEXT NOT NULL,
            platform_user_id         TEXT NOT NULL,
            human_role               TEXT NOT NULL DEFAULT 'member',
            human_email              TEXT,
            display_name             TEXT,
            canonical_identity_key   TEXT,
            created_at               TEXT NOT NULL,
            updated_at               TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_identities_platform
            ON identities(platform, platform_user_id);
        CREATE INDEX IF NOT EXISTS idx_identities_canonical
            ON identities(canonical_identity_key);",
    )?;
    Ok(())
}
