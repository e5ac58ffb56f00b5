use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use teleclaude_core::{AdapterKind, AgentVariant, HumanRole, IdentityKey, MachineName, SessionId, ThinkingMode};
use tracing::{debug, instrument, warn};

use crate::error::{Result, SessionError};
use crate::types::{RelayStatus, ResumeKind, Session, SessionStatus};

/// Sticky set is bounded at 5 members (spec §4.4).
pub const STICKY_SET_CAP: usize = 5;

/// Thread-safe manager for persisted sessions.
///
/// Wraps a single SQLite connection in a `Mutex`, mirroring the teacher's
/// `SessionManager` shape — sufficient for the single-writer-per-machine
/// daemon process this crate runs inside.
pub struct SessionManager {
    db: Mutex<Connection>,
}

impl SessionManager {
    /// Wrap an already-open (and `db::init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    /// Provision a new session row. The caller is responsible for creating
    /// the terminal pane via the Terminal Bridge before or after this call
    /// — the Session Store does not own pane lifecycle.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, adapter_metadata), fields(project_dir, agent = %agent))]
    pub fn create_session(
        &self,
        machine: MachineName,
        project_dir: String,
        agent: AgentVariant,
        thinking_mode: ThinkingMode,
        adapter_types: Vec<AdapterKind>,
        adapter_metadata: HashMap<String, serde_json::Value>,
        title: Option<String>,
        human_role: HumanRole,
        identity_key: Option<IdentityKey>,
        human_email: Option<String>,
        initiator_session_id: Option<SessionId>,
    ) -> Result<Session> {
        let id = SessionId::new();
        let now = chrono::Utc::now().to_rfc3339();
        let pane_name = format!("session-{id}");

        let session = Session {
            id,
            machine,
            pane_name,
            project_dir,
            agent,
            thinking_mode,
            title,
            created_at: now.clone(),
            last_activity_at: now,
            last_output_summary: None,
            status: SessionStatus::Active,
            adapter_types,
            adapter_metadata,
            initiator_session_id,
            human_role,
            human_email,
            identity_key,
            relay_status: RelayStatus::Inactive,
            relay_discord_channel_id: None,
            relay_started_at: None,
            native_session_id: None,
            last_memory_extraction_at: None,
            help_desk_processed_at: None,
        };

        self.insert(&session)?;
        debug!(session_id = %session.id, "session created");
        Ok(session)
    }

    fn insert(&self, s: &Session) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO sessions
             (id, machine, pane_name, project_dir, agent, thinking_mode, title,
              created_at, last_activity_at, last_output_summary, status,
              adapter_types, adapter_metadata, initiator_session_id, human_role,
              human_email, identity_key, relay_status, relay_discord_channel_id,
              relay_started_at, native_session_id, last_memory_extraction_at,
              help_desk_processed_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23)",
            params![
                s.id.as_str(),
                s.machine.as_str(),
                s.pane_name,
                s.project_dir,
                s.agent.as_str(),
                s.thinking_mode.as_str(),
                s.title,
                s.created_at,
                s.last_activity_at,
                s.last_output_summary,
                s.status.as_str(),
                serde_json::to_string(&s.adapter_types).unwrap_or_default(),
                serde_json::to_string(&s.adapter_metadata).unwrap_or_default(),
                s.initiator_session_id.as_ref().map(|i| i.as_str().to_string()),
                s.human_role.to_string(),
                s.human_email,
                s.identity_key.as_ref().map(|k| k.as_str().to_string()),
                s.relay_status.as_str(),
                s.relay_discord_channel_id,
                s.relay_started_at,
                s.native_session_id,
                s.last_memory_extraction_at,
                s.help_desk_processed_at,
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %id))]
    pub fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        let db = self.db.lock().unwrap();
        match db.query_row(&select_sql("id = ?1"), params![id.as_str()], row_to_session) {
            Ok(s) => Ok(Some(s?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SessionError::Database(e)),
        }
    }

    /// Look up by the agent CLI's own continuation handle — used by
    /// `resume(kind, key)` when `kind` is a native-agent variant.
    #[instrument(skip(self))]
    pub fn get_by_native(&self, agent: AgentVariant, native_id: &str) -> Result<Option<Session>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &select_sql("agent = ?1 AND native_session_id = ?2"),
            params![agent.as_str(), native_id],
            row_to_session,
        ) {
            Ok(s) => Ok(Some(s?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SessionError::Database(e)),
        }
    }

    /// Resolve a `resume` request's `ResumeKind`/key pair against the local
    /// store only — remote lookup via the Cross-Machine Transport is the
    /// caller's responsibility when this returns `None` (spec §4.4).
    pub fn resume_local(&self, kind: ResumeKind, key: &str) -> Result<Option<Session>> {
        match kind {
            ResumeKind::ByInternalId => self.get(&SessionId::from(key)),
            ResumeKind::ByNativeClaude => self.get_by_native(AgentVariant::Claude, key),
            ResumeKind::ByNativeGemini => self.get_by_native(AgentVariant::Gemini, key),
            ResumeKind::ByNativeCodex => self.get_by_native(AgentVariant::Codex, key),
        }
    }

    pub fn list_for_machine(&self, machine: &MachineName) -> Result<Vec<Session>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&select_sql("machine = ?1 ORDER BY last_activity_at DESC"))?;
        let rows = stmt.query_map(params![machine.as_str()], row_to_session)?;
        collect_rows(rows)
    }

    pub fn list_active(&self) -> Result<Vec<Session>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&select_sql("status = 'active' ORDER BY last_activity_at DESC"))?;
        let rows = stmt.query_map([], row_to_session)?;
        collect_rows(rows)
    }

    /// Find the active session bound to a specific adapter-private value
    /// (e.g. a Discord channel id, a Telegram chat/topic id) — how inbound
    /// platform traffic is routed back to its session without a dedicated
    /// binding table (spec §3 `adapter_metadata`).
    ///
    /// `adapter_metadata` is stored as a JSON object per adapter kind; this
    /// does a substring match against the serialized column rather than a
    /// JSON1 query, consistent with how `adapter_types`/`adapter_metadata`
    /// are already persisted as opaque JSON text in this table.
    pub fn find_by_adapter_binding(&self, kind: AdapterKind, value: &str) -> Result<Option<Session>> {
        let db = self.db.lock().unwrap();
        let needle = format!("%{value}%");
        let mut stmt = db.prepare(&select_sql(
            "status = 'active' AND adapter_types LIKE ?1 AND adapter_metadata LIKE ?2 ORDER BY last_activity_at DESC",
        ))?;
        let kind_needle = format!("%{}%", kind.as_str());
        let mut rows = stmt.query_map(params![kind_needle, needle], row_to_session)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Admin sessions idle past `idle_timeout_secs` with no relay in flight.
    /// Customer sessions are excluded — they only ever leave via the
    /// 72-hour sweep (spec §4.4).
    pub fn list_idle_candidates(&self, idle_timeout_secs: i64) -> Result<Vec<Session>> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::seconds(idle_timeout_secs)).to_rfc3339();
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&select_sql(
            "status = 'active' AND human_role != 'customer' AND last_activity_at < ?1",
        ))?;
        let rows = stmt.query_map(params![cutoff], row_to_session)?;
        collect_rows(rows)
    }

    /// Customer sessions idle past `sweep_secs` — the only path that closes
    /// them (spec §4.4).
    pub fn list_customer_sweep_candidates(&self, sweep_secs: i64) -> Result<Vec<Session>> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::seconds(sweep_secs)).to_rfc3339();
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&select_sql(
            "status = 'active' AND human_role = 'customer' AND last_activity_at < ?1",
        ))?;
        let rows = stmt.query_map(params![cutoff], row_to_session)?;
        collect_rows(rows)
    }

    #[instrument(skip(self, summary), fields(session_id = %id))]
    pub fn touch_activity(&self, id: &SessionId, summary: Option<String>) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE sessions SET last_activity_at = ?1, last_output_summary = COALESCE(?2, last_output_summary),
             status = CASE WHEN status = 'idle-compacted' THEN 'active' ELSE status END
             WHERE id = ?3",
            params![now, summary, id.as_str()],
        )?;
        ensure_found(rows, id)
    }

    pub fn set_native_session_id(&self, id: &SessionId, native_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE sessions SET native_session_id = ?1 WHERE id = ?2",
            params![native_id, id.as_str()],
        )?;
        ensure_found(rows, id)
    }

    pub fn mark_idle_compacted(&self, id: &SessionId) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE sessions SET status = 'idle-compacted' WHERE id = ?1 AND status = 'active'",
            params![id.as_str()],
        )?;
        ensure_found(rows, id)
    }

    /// Close a session. Idempotent: closing an already-closed session is a
    /// no-op, not an error.
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn close(&self, id: &SessionId) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE sessions SET status = 'closed' WHERE id = ?1 AND status != 'closed'",
            params![id.as_str()],
        )?;
        if rows == 0 {
            debug!(session_id = %id, "close is a no-op (already closed or missing)");
        }
        drop(db);
        self.sticky_remove(id)
    }

    pub fn record_memory_extraction(&self, id: &SessionId) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE sessions SET last_memory_extraction_at = ?1 WHERE id = ?2",
            params![now, id.as_str()],
        )?;
        ensure_found(rows, id)
    }

    pub fn record_help_desk_processed(&self, id: &SessionId) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE sessions SET help_desk_processed_at = ?1 WHERE id = ?2",
            params![now, id.as_str()],
        )?;
        ensure_found(rows, id)
    }

    /// Activate Help-Desk Relay diversion (spec §4.7). Enforces the
    /// invariant that `relay_status = active` always carries a channel id.
    pub fn activate_relay(&self, id: &SessionId, discord_channel_id: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE sessions SET relay_status = 'active', relay_discord_channel_id = ?1,
             relay_started_at = ?2 WHERE id = ?3",
            params![discord_channel_id, now, id.as_str()],
        )?;
        ensure_found(rows, id)
    }

    /// Clear relay state on handback (spec §4.7).
    pub fn clear_relay(&self, id: &SessionId) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE sessions SET relay_status = 'inactive', relay_discord_channel_id = NULL,
             relay_started_at = NULL WHERE id = ?1",
            params![id.as_str()],
        )?;
        ensure_found(rows, id)
    }

    /// Nested guard check (spec §4.4): an active relay blocks another
    /// top-level operation that would recursively start a gathering.
    pub fn is_relay_active(&self, id: &SessionId) -> Result<bool> {
        Ok(self
            .get(id)?
            .map(|s| s.relay_status == RelayStatus::Active)
            .unwrap_or(false))
    }

    /// Reject the caller with `NestedGuard` if this session already has an
    /// active relay in flight.
    pub fn guard_nested(&self, id: &SessionId) -> Result<()> {
        if self.is_relay_active(id)? {
            return Err(SessionError::NestedGuard(id.to_string()));
        }
        Ok(())
    }

    /// Add to the sticky set. Refused silently past the cap — returns
    /// `Ok(false)` rather than an error, matching spec §4.4 ("silently
    /// refused for additions").
    pub fn sticky_add(&self, id: &SessionId) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row("SELECT COUNT(*) FROM sticky_sessions", [], |r| r.get(0))?;
        if count as usize >= STICKY_SET_CAP {
            warn!(session_id = %id, "sticky set at cap, refusing addition");
            return Ok(false);
        }
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT OR IGNORE INTO sticky_sessions (session_id, added_at) VALUES (?1, ?2)",
            params![id.as_str(), now],
        )?;
        Ok(true)
    }

    /// Remove from the sticky set. Removals are always allowed (spec §4.4).
    pub fn sticky_remove(&self, id: &SessionId) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM sticky_sessions WHERE session_id = ?1", params![id.as_str()])?;
        Ok(())
    }

    pub fn sticky_list(&self) -> Result<Vec<SessionId>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT session_id FROM sticky_sessions ORDER BY added_at ASC")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        Ok(rows.filter_map(|r| r.ok()).map(SessionId::from).collect())
    }

    /// Permanently delete a session row and its sticky-set membership.
    pub fn delete(&self, id: &SessionId) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows = db.execute("DELETE FROM sessions WHERE id = ?1", params![id.as_str()])?;
        db.execute("DELETE FROM sticky_sessions WHERE session_id = ?1", params![id.as_str()])?;
        ensure_found(rows, id)
    }
}

fn ensure_found(rows_changed: usize, id: &SessionId) -> Result<()> {
    if rows_changed == 0 {
        return Err(SessionError::NotFound(id.to_string()));
    }
    Ok(())
}

const SELECT_COLUMNS: &str = "id, machine, pane_name, project_dir, agent, thinking_mode, title, \
     created_at, last_activity_at, last_output_summary, status, adapter_types, adapter_metadata, \
     initiator_session_id, human_role, human_email, identity_key, relay_status, \
     relay_discord_channel_id, relay_started_at, native_session_id, last_memory_extraction_at, \
     help_desk_processed_at";

fn select_sql(predicate: &str) -> String {
    format!("SELECT {SELECT_COLUMNS} FROM sessions WHERE {predicate}")
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<rusqlite::Result<Session>>>,
) -> Result<Vec<Session>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

/// Map a SQLite row to a `Session`. Returns the outer `rusqlite::Result` for
/// `query_row`/`query_map` compatibility and an inner `crate::Result` for
/// decode failures that aren't SQLite errors (malformed JSON/enum columns).
fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Session>> {
    let adapter_types_json: String = row.get(11)?;
    let adapter_metadata_json: String = row.get(12)?;
    let status_str: String = row.get(10)?;
    let agent_str: String = row.get(4)?;
    let thinking_mode_str: String = row.get(5)?;
    let human_role_str: String = row.get(14)?;
    let relay_status_str: String = row.get(17)?;

    let decoded = (|| -> std::result::Result<Session, String> {
        let adapter_types: Vec<AdapterKind> =
            serde_json::from_str(&adapter_types_json).map_err(|e| e.to_string())?;
        let adapter_metadata: HashMap<String, serde_json::Value> =
            serde_json::from_str(&adapter_metadata_json).map_err(|e| e.to_string())?;
        let status = SessionStatus::from_str(&status_str)?;
        let agent = AgentVariant::from_str(&agent_str)?;
        let thinking_mode = ThinkingMode::from_str(&thinking_mode_str)?;
        let human_role = HumanRole::from_str(&human_role_str)?;
        let relay_status = RelayStatus::from_str(&relay_status_str)?;

        Ok(Session {
            id: SessionId::from(row.get::<_, String>(0)?),
            machine: MachineName::from(row.get::<_, String>(1)?),
            pane_name: row.get(2)?,
            project_dir: row.get(3)?,
            agent,
            thinking_mode,
            title: row.get(6)?,
            created_at: row.get(7)?,
            last_activity_at: row.get(8)?,
            last_output_summary: row.get(9)?,
            status,
            adapter_types,
            adapter_metadata,
            initiator_session_id: row.get::<_, Option<String>>(13)?.map(SessionId::from),
            human_role,
            human_email: row.get(15)?,
            identity_key: row.get::<_, Option<String>>(16)?.map(IdentityKey),
            relay_status,
            relay_discord_channel_id: row.get(18)?,
            relay_started_at: row.get(19)?,
            native_session_id: row.get(20)?,
            last_memory_extraction_at: row.get(21)?,
            help_desk_processed_at: row.get(22)?,
        })
    })();

    Ok(decoded.map_err(SessionError::Corrupt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use teleclaude_core::AdapterKind;

    fn test_manager() -> SessionManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        SessionManager::new(conn)
    }

    fn create(mgr: &SessionManager, role: HumanRole) -> Session {
        mgr.create_session(
            MachineName::from("laptop"),
            "/home/dev/project".to_string(),
            AgentVariant::Claude,
            ThinkingMode::Medium,
            vec![AdapterKind::Telegram],
            HashMap::new(),
            None,
            role,
            None,
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn create_then_get_roundtrips() {
        let mgr = test_manager();
        let s = create(&mgr, HumanRole::Member);
        let fetched = mgr.get(&s.id).unwrap().unwrap();
        assert_eq!(fetched.id, s.id);
        assert_eq!(fetched.adapter_types, vec![AdapterKind::Telegram]);
        assert_eq!(fetched.status, SessionStatus::Active);
    }

    #[test]
    fn close_is_idempotent() {
        let mgr = test_manager();
        let s = create(&mgr, HumanRole::Member);
        mgr.close(&s.id).unwrap();
        mgr.close(&s.id).unwrap();
        assert_eq!(mgr.get(&s.id).unwrap().unwrap().status, SessionStatus::Closed);
    }

    #[test]
    fn sticky_set_refuses_past_cap() {
        let mgr = test_manager();
        let mut ids = Vec::new();
        for _ in 0..STICKY_SET_CAP {
            let s = create(&mgr, HumanRole::Member);
            assert!(mgr.sticky_add(&s.id).unwrap());
            ids.push(s.id);
        }
        let overflow = create(&mgr, HumanRole::Member);
        assert!(!mgr.sticky_add(&overflow.id).unwrap());
        assert_eq!(mgr.sticky_list().unwrap().len(), STICKY_SET_CAP);

        mgr.sticky_remove(&ids[0]).unwrap();
        assert!(mgr.sticky_add(&overflow.id).unwrap());
    }

    #[test]
    fn customer_sessions_excluded_from_idle_candidates() {
        let mgr = test_manager();
        let admin = create(&mgr, HumanRole::Member);
        let customer = create(&mgr, HumanRole::Customer);
        // Force both into the past so the idle window has definitely elapsed.
        {
            let db = mgr.db.lock().unwrap();
            let past = (chrono::Utc::now() - chrono::Duration::seconds(120)).to_rfc3339();
            db.execute(
                "UPDATE sessions SET last_activity_at = ?1",
                params![past],
            )
            .unwrap();
        }
        let idle = mgr.list_idle_candidates(60).unwrap();
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].id, admin.id);

        let sweep = mgr.list_customer_sweep_candidates(60).unwrap();
        assert_eq!(sweep.len(), 1);
        assert_eq!(sweep[0].id, customer.id);
    }

    #[test]
    fn find_by_adapter_binding_matches_bound_channel() {
        let mgr = test_manager();
        let mut metadata = HashMap::new();
        metadata.insert("telegram".to_string(), serde_json::json!({"chat_id": "chat-42"}));
        let s = mgr
            .create_session(
                MachineName::from("laptop"),
                "/home/dev/project".to_string(),
                AgentVariant::Claude,
                ThinkingMode::Medium,
                vec![AdapterKind::Telegram],
                metadata,
                None,
                HumanRole::Member,
                None,
                None,
                None,
            )
            .unwrap();

        let found = mgr.find_by_adapter_binding(AdapterKind::Telegram, "chat-42").unwrap();
        assert_eq!(found.unwrap().id, s.id);
        assert!(mgr.find_by_adapter_binding(AdapterKind::Telegram, "chat-99").unwrap().is_none());
    }

    #[test]
    fn relay_lifecycle_enforces_invariant() {
        let mgr = test_manager();
        let s = create(&mgr, HumanRole::Customer);
        assert!(!mgr.is_relay_active(&s.id).unwrap());

        mgr.activate_relay(&s.id, "discord-channel-1").unwrap();
        let reloaded = mgr.get(&s.id).unwrap().unwrap();
        assert!(reloaded.relay_invariant_holds());
        assert!(mgr.is_relay_active(&s.id).unwrap());
        assert!(mgr.guard_nested(&s.id).is_err());

        mgr.clear_relay(&s.id).unwrap();
        assert!(!mgr.is_relay_active(&s.id).unwrap());
        assert!(mgr.guard_nested(&s.id).is_ok());
    }
}
