use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection};
use teleclaude_core::{AdapterKind, HumanRole, IdentityKey};

use crate::error::{IdentityError, Result};
use crate::types::IdentityRecord;

const SELECT_COLUMNS: &str = "identity_key, platform, platform_user_id, human_role, human_email, \
     display_name, canonical_identity_key, created_at, updated_at";

/// Insert a brand-new identity row with the default role, or return the
/// existing one unchanged. Idempotent — the hot path on every inbound
/// message calls this.
pub fn get_or_create(conn: &Connection, platform: AdapterKind, platform_user_id: &str) -> Result<IdentityRecord> {
    let identity_key = IdentityKey::new(platform.as_str(), platform_user_id);
    if let Some(existing) = get(conn, &identity_key)? {
        return Ok(existing);
    }

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO identities
            (identity_key, platform, platform_user_id, human_role, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?5)",
        params![identity_key.as_str(), platform.as_str(), platform_user_id, HumanRole::default().to_string(), now],
    )?;

    get(conn, &identity_key)?.ok_or_else(|| IdentityError::NotFound(identity_key.to_string()))
}

pub fn get(conn: &Connection, identity_key: &IdentityKey) -> Result<Option<IdentityRecord>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM identities WHERE identity_key = ?1");
    match conn.query_row(&sql, params![identity_key.as_str()], row_to_identity) {
        Ok(r) => Ok(Some(r?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(IdentityError::Database(e)),
    }
}

pub fn set_role(conn: &Connection, identity_key: &IdentityKey, role: HumanRole) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let rows = conn.execute(
        "UPDATE identities SET human_role = ?1, updated_at = ?2 WHERE identity_key = ?3",
        params![role.to_string(), now, identity_key.as_str()],
    )?;
    if rows == 0 {
        return Err(IdentityError::NotFound(identity_key.to_string()));
    }
    Ok(())
}

pub fn set_human_email(conn: &Connection, identity_key: &IdentityKey, email: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let rows = conn.execute(
        "UPDATE identities SET human_email = ?1, updated_at = ?2 WHERE identity_key = ?3",
        params![email, now, identity_key.as_str()],
    )?;
    if rows == 0 {
        return Err(IdentityError::NotFound(identity_key.to_string()));
    }
    Ok(())
}

/// Alias `source` to `target` so future lookups of `source` resolve to
/// `target`'s role and contact info (cross-channel identity linking).
pub fn link_alias(conn: &Connection, source: &IdentityKey, target: &IdentityKey) -> Result<()> {
    if get(conn, target)?.is_none() {
        return Err(IdentityError::NotFound(target.to_string()));
    }
    let now = Utc::now().to_rfc3339();
    let rows = conn.execute(
        "UPDATE identities SET canonical_identity_key = ?1, updated_at = ?2 WHERE identity_key = ?3",
        params![target.as_str(), now, source.as_str()],
    )?;
    if rows == 0 {
        return Err(IdentityError::NotFound(source.to_string()));
    }
    Ok(())
}

fn row_to_identity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<IdentityRecord>> {
    let platform_str: String = row.get(1)?;
    let role_str: String = row.get(3)?;

    let decoded = (|| -> std::result::Result<IdentityRecord, String> {
        Ok(IdentityRecord {
            identity_key: IdentityKey(row.get::<_, String>(0)?),
            platform: AdapterKind::from_str(&platform_str)?,
            platform_user_id: row.get(2)?,
            human_role: HumanRole::from_str(&role_str)?,
            human_email: row.get(4)?,
            display_name: row.get(5)?,
            canonical_identity_key: row.get::<_, Option<String>>(6)?.map(IdentityKey),
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    })();

    Ok(decoded.map_err(IdentityError::Corrupt))
}
