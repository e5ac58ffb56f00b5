use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use teleclaude_core::{AdapterKind, HumanRole, IdentityKey};
use tracing::debug;

use crate::error::{IdentityError, Result};
use crate::identity;
use crate::types::IdentityRecord;

/// Maximum number of identity_key → canonical identity_key pairs kept in
/// the in-process cache. Simple eviction: drop the oldest half when full.
const CACHE_MAX: usize = 256;

/// Resolves adapter-supplied `(platform, platform_user_id)` pairs into
/// `IdentityRecord`s, auto-creating on first contact and following
/// cross-channel alias links (spec §3 `identity_key` derivation).
pub struct IdentityResolver {
    db: Arc<Mutex<Connection>>,
    cache: Mutex<HashMap<IdentityKey, IdentityKey>>,
    cache_order: Mutex<Vec<IdentityKey>>,
}

impl IdentityResolver {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self {
            db,
            cache: Mutex::new(HashMap::new()),
            cache_order: Mutex::new(Vec::new()),
        }
    }

    /// Resolve a platform account to its identity, following any alias to
    /// the canonical record it was linked to.
    pub fn resolve(&self, platform: AdapterKind, platform_user_id: &str) -> Result<IdentityRecord> {
        let conn = self.db.lock().unwrap();
        let record = identity::get_or_create(&conn, platform, platform_user_id)?;
        self.resolve_canonical_locked(&conn, record)
    }

    /// Look up an already-known identity key without creating anything.
    pub fn get(&self, identity_key: &IdentityKey) -> Result<Option<IdentityRecord>> {
        let conn = self.db.lock().unwrap();
        identity::get(&conn, identity_key)
    }

    pub fn set_role(&self, identity_key: &IdentityKey, role: HumanRole) -> Result<()> {
        let conn = self.db.lock().unwrap();
        identity::set_role(&conn, identity_key, role)
    }

    pub fn set_human_email(&self, identity_key: &IdentityKey, email: &str) -> Result<()> {
        let conn = self.db.lock().unwrap();
        identity::set_human_email(&conn, identity_key, email)
    }

    /// Alias `source` onto `target`'s identity, merging role/contact info
    /// for future lookups. Caller is responsible for verifying `admin_role`
    /// is `HumanRole::Admin` before calling this.
    pub fn link(&self, admin_role: HumanRole, source: &IdentityKey, target: &IdentityKey) -> Result<()> {
        if !admin_role.is_admin() {
            return Err(IdentityError::PermissionDenied);
        }
        let conn = self.db.lock().unwrap();
        identity::link_alias(&conn, source, target)?;
        drop(conn);
        self.invalidate(source);
        Ok(())
    }

    fn resolve_canonical_locked(&self, conn: &Connection, record: IdentityRecord) -> Result<IdentityRecord> {
        let original_key = record.identity_key.clone();
        if let Some(cached) = self.cache_lookup(&original_key) {
            debug!(identity_key = %original_key, canonical = %cached, "alias cache hit");
            if let Some(canonical) = identity::get(conn, &cached)? {
                return Ok(canonical);
            }
        }

        match &record.canonical_identity_key {
            None => Ok(record),
            Some(canonical_key) => {
                let canonical = identity::get(conn, canonical_key)?
                    .ok_or_else(|| IdentityError::NotFound(canonical_key.to_string()))?;
                self.cache_insert(original_key, canonical_key.clone());
                Ok(canonical)
            }
        }
    }

    fn invalidate(&self, key: &IdentityKey) {
        let mut cache = self.cache.lock().unwrap();
        let mut order = self.cache_order.lock().unwrap();
        cache.remove(key);
        order.retain(|k| k != key);
    }

    fn cache_lookup(&self, key: &IdentityKey) -> Option<IdentityKey> {
        self.cache.lock().unwrap().get(key).cloned()
    }

    fn cache_insert(&self, key: IdentityKey, canonical: IdentityKey) {
        let mut cache = self.cache.lock().unwrap();
        let mut order = self.cache_order.lock().unwrap();
        if cache.len() >= CACHE_MAX {
            let evict_count = CACHE_MAX / 2;
            let to_remove: Vec<_> = order.drain(..evict_count).collect();
            for k in to_remove {
                cache.remove(&k);
            }
        }
        order.push(key.clone());
        cache.insert(key, canonical);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> IdentityResolver {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        IdentityResolver::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn resolve_creates_then_reuses() {
        let r = resolver();
        let first = r.resolve(AdapterKind::Telegram, "42").unwrap();
        assert_eq!(first.human_role, HumanRole::Member);
        let second = r.resolve(AdapterKind::Telegram, "42").unwrap();
        assert_eq!(first.identity_key, second.identity_key);
    }

    #[test]
    fn link_follows_alias_to_canonical() {
        let r = resolver();
        let telegram = r.resolve(AdapterKind::Telegram, "42").unwrap();
        let discord = r.resolve(AdapterKind::Discord, "99").unwrap();
        r.set_role(&discord.identity_key, HumanRole::Admin).unwrap();

        r.link(HumanRole::Admin, &telegram.identity_key, &discord.identity_key).unwrap();

        let resolved = r.resolve(AdapterKind::Telegram, "42").unwrap();
        assert_eq!(resolved.identity_key, discord.identity_key);
        assert_eq!(resolved.human_role, HumanRole::Admin);
    }

    #[test]
    fn link_rejects_non_admin() {
        let r = resolver();
        let a = r.resolve(AdapterKind::Telegram, "1").unwrap();
        let b = r.resolve(AdapterKind::Discord, "2").unwrap();
        assert!(r.link(HumanRole::Member, &a.identity_key, &b.identity_key).is_err());
    }
}
