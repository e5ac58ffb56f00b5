use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use teleclaude_core::NotificationId;

use crate::error::{EventsError, Result};
use crate::types::{AgentStatus, HumanStatus, Notification};

/// Persists projected notifications (spec §4.8, §3 "at most one row per
/// idempotency key"). Thread-safe: wraps the SQLite connection in a
/// `Mutex`, same shape `teleclaude-sessions::SessionManager` uses.
pub struct NotificationStore {
    db: Mutex<Connection>,
}

impl NotificationStore {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    pub fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Notification>> {
        let db = self.db.lock().unwrap();
        db.query_row(&format!("{} WHERE idempotency_key = ?1", SELECT_BASE), params![key], row_to_notification)
            .optional()
            .map_err(EventsError::from)
    }

    pub fn find_by_group_key(&self, event_type: &str, group_key: &str) -> Result<Option<Notification>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            &format!("{} WHERE event_type = ?1 AND group_key = ?2 ORDER BY created_at DESC", SELECT_BASE),
            params![event_type, group_key],
            row_to_notification,
        )
        .optional()
        .map_err(EventsError::from)
    }

    pub fn get(&self, id: &NotificationId) -> Result<Option<Notification>> {
        let db = self.db.lock().unwrap();
        db.query_row(&format!("{} WHERE id = ?1", SELECT_BASE), params![id.as_str()], row_to_notification)
            .optional()
            .map_err(EventsError::from)
    }

    pub fn insert(&self, n: &Notification) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO notifications
             (id, event_type, version, source, level, domain, visibility, entity,
              description, payload, idempotency_key, group_key, human_status,
              agent_status, agent_id, resolution, created_at, updated_at,
              seen_at, claimed_at, resolved_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)",
            params![
                n.id.as_str(),
                n.event_type,
                n.version,
                n.source,
                n.level.to_string(),
                n.domain,
                n.visibility.to_string(),
                n.entity,
                n.description,
                n.payload.to_string(),
                n.idempotency_key,
                n.group_key,
                n.human_status.to_string(),
                n.agent_status.to_string(),
                n.agent_id,
                n.resolution.as_ref().map(|v| v.to_string()),
                n.created_at,
                n.updated_at,
                n.seen_at,
                n.claimed_at,
                n.resolved_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing row's payload/description, optionally resetting
    /// `human_status` to `unseen` when a meaningful field changed (spec
    /// §4.8 case 3/4).
    pub fn update_fields(&self, id: &NotificationId, description: &str, payload: &serde_json::Value, reset_human_status: bool, now: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        if reset_human_status {
            db.execute(
                "UPDATE notifications SET description = ?1, payload = ?2, human_status = 'unseen', updated_at = ?3 WHERE id = ?4",
                params![description, payload.to_string(), now, id.as_str()],
            )?;
        } else {
            db.execute(
                "UPDATE notifications SET description = ?1, payload = ?2, updated_at = ?3 WHERE id = ?4",
                params![description, payload.to_string(), now, id.as_str()],
            )?;
        }
        Ok(())
    }

    pub fn mark_seen(&self, id: &NotificationId, now: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE notifications SET human_status = 'seen', seen_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![now, id.as_str()],
        )?;
        Ok(())
    }

    /// Advance the agent-status axis. `claimed_at` is stamped only on the
    /// `none -> claimed` transition (spec §4.8 notification state machine);
    /// later transitions leave it untouched.
    pub fn set_agent_status(&self, id: &NotificationId, status: AgentStatus, agent_id: Option<&str>, now: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let current: Option<String> = db
            .query_row("SELECT claimed_at FROM notifications WHERE id = ?1", params![id.as_str()], |r| r.get(0))
            .optional()?
            .flatten();

        if status == AgentStatus::Claimed && current.is_none() {
            db.execute(
                "UPDATE notifications SET agent_status = ?1, agent_id = ?2, claimed_at = ?3, updated_at = ?3 WHERE id = ?4",
                params![status.to_string(), agent_id, now, id.as_str()],
            )?;
        } else {
            db.execute(
                "UPDATE notifications SET agent_status = ?1, agent_id = ?2, updated_at = ?3 WHERE id = ?4",
                params![status.to_string(), agent_id, now, id.as_str()],
            )?;
        }
        Ok(())
    }

    pub fn resolve(&self, id: &NotificationId, resolution: Option<&serde_json::Value>, now: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE notifications SET agent_status = 'resolved', resolution = ?1, resolved_at = ?2, updated_at = ?2 WHERE id = ?3",
            params![resolution.map(|v| v.to_string()), now, id.as_str()],
        )?;
        Ok(())
    }

    pub fn find_by_group_key_any(&self, group_key: &str) -> Result<Option<Notification>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            &format!("{} WHERE group_key = ?1 ORDER BY created_at DESC", SELECT_BASE),
            params![group_key],
            row_to_notification,
        )
        .optional()
        .map_err(EventsError::from)
    }

    /// Backs `GET /api/notifications` (spec §6): every filter is optional
    /// and AND-ed together, newest first, paginated with `limit`/`offset`.
    pub fn list_filtered(&self, filter: &NotificationFilter) -> Result<Vec<Notification>> {
        let mut sql = SELECT_BASE.to_string();
        let mut clauses = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(level) = filter.level {
            clauses.push(format!("level = ?{}", values.len() + 1));
            values.push(Box::new(level.to_string()));
        }
        if let Some(domain) = &filter.domain {
            clauses.push(format!("domain = ?{}", values.len() + 1));
            values.push(Box::new(domain.clone()));
        }
        if let Some(human_status) = filter.human_status {
            clauses.push(format!("human_status = ?{}", values.len() + 1));
            values.push(Box::new(human_status.to_string()));
        }
        if let Some(agent_status) = filter.agent_status {
            clauses.push(format!("agent_status = ?{}", values.len() + 1));
            values.push(Box::new(agent_status.to_string()));
        }
        if let Some(visibility) = filter.visibility {
            clauses.push(format!("visibility = ?{}", values.len() + 1));
            values.push(Box::new(visibility.to_string()));
        }
        if let Some(since) = &filter.since {
            clauses.push(format!("created_at >= ?{}", values.len() + 1));
            values.push(Box::new(since.clone()));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(&format!(
            " ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            values.len() + 1,
            values.len() + 2
        ));
        values.push(Box::new(filter.limit as i64));
        values.push(Box::new(filter.offset as i64));

        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), row_to_notification)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// Filter bundle for [`NotificationStore::list_filtered`]. Every field is
/// optional except the pagination pair, which the caller defaults.
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub level: Option<crate::types::EventLevel>,
    pub domain: Option<String>,
    pub human_status: Option<HumanStatus>,
    pub agent_status: Option<AgentStatus>,
    pub visibility: Option<crate::types::Visibility>,
    pub since: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

const SELECT_BASE: &str = "SELECT id, event_type, version, source, level, domain, visibility, entity,
    description, payload, idempotency_key, group_key, human_status, agent_status,
    agent_id, resolution, created_at, updated_at, seen_at, claimed_at, resolved_at
    FROM notifications";

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let level_str: String = row.get(4)?;
    let visibility_str: String = row.get(6)?;
    let human_status_str: String = row.get(12)?;
    let agent_status_str: String = row.get(13)?;
    let payload_str: String = row.get(9)?;
    let resolution_str: Option<String> = row.get(15)?;
    Ok(Notification {
        id: NotificationId(row.get(0)?),
        event_type: row.get(1)?,
        version: row.get(2)?,
        source: row.get(3)?,
        level: level_str.parse().unwrap_or(crate::types::EventLevel::Operational),
        domain: row.get(5)?,
        visibility: visibility_str.parse().unwrap_or(crate::types::Visibility::Local),
        entity: row.get(7)?,
        description: row.get(8)?,
        payload: serde_json::from_str(&payload_str).unwrap_or(serde_json::Value::Null),
        idempotency_key: row.get(10)?,
        group_key: row.get(11)?,
        human_status: human_status_str.parse().unwrap_or(HumanStatus::Unseen),
        agent_status: agent_status_str.parse().unwrap_or(AgentStatus::None),
        agent_id: row.get(14)?,
        resolution: resolution_str.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
        seen_at: row.get(18)?,
        claimed_at: row.get(19)?,
        resolved_at: row.get(20)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventLevel, Visibility};
    use serde_json::json;

    fn sample(idempotency_key: &str, group_key: Option<&str>) -> Notification {
        Notification {
            id: NotificationId::new(),
            event_type: "agent.needs_input".to_string(),
            version: 1,
            source: "daemon".to_string(),
            level: EventLevel::Workflow,
            domain: "agent".to_string(),
            visibility: Visibility::Cluster,
            entity: "session-1".to_string(),
            description: "waiting on input".to_string(),
            payload: json!({"prompt_hash": "abc"}),
            idempotency_key: idempotency_key.to_string(),
            group_key: group_key.map(str::to_string),
            human_status: HumanStatus::Unseen,
            agent_status: AgentStatus::None,
            agent_id: None,
            resolution: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
            seen_at: None,
            claimed_at: None,
            resolved_at: None,
        }
    }

    #[test]
    fn insert_then_find_by_idempotency_key() {
        let store = NotificationStore::new(Connection::open_in_memory().unwrap()).unwrap();
        let n = sample("key-1", Some("group-1"));
        store.insert(&n).unwrap();
        let found = store.find_by_idempotency_key("key-1").unwrap().unwrap();
        assert_eq!(found.idempotency_key, "key-1");
    }

    #[test]
    fn claimed_at_set_only_once() {
        let store = NotificationStore::new(Connection::open_in_memory().unwrap()).unwrap();
        let n = sample("key-2", Some("group-2"));
        let id = n.id.clone();
        store.insert(&n).unwrap();

        store.set_agent_status(&id, AgentStatus::Claimed, Some("agent-a"), "t1").unwrap();
        let after_claim = store.get(&id).unwrap().unwrap();
        assert_eq!(after_claim.claimed_at.as_deref(), Some("t1"));

        store.set_agent_status(&id, AgentStatus::InProgress, Some("agent-a"), "t2").unwrap();
        let after_progress = store.get(&id).unwrap().unwrap();
        assert_eq!(after_progress.claimed_at.as_deref(), Some("t1"));
        assert_eq!(after_progress.agent_status, AgentStatus::InProgress);
    }

    #[test]
    fn find_by_group_key_returns_latest() {
        let store = NotificationStore::new(Connection::open_in_memory().unwrap()).unwrap();
        store.insert(&sample("key-3", Some("group-3"))).unwrap();
        let found = store.find_by_group_key("agent.needs_input", "group-3").unwrap();
        assert!(found.is_some());
    }
}
