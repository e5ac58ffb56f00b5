//! Identity records: the `identity_key`/`human_role`/`human_email` triple
//! derived from adapter metadata (spec §3), plus cross-channel linking.

use serde::{Deserialize, Serialize};
use teleclaude_core::{AdapterKind, HumanRole, IdentityKey};

/// One platform account, and the role/contact info TeleClaude has on file
/// for it. Several `IdentityRecord`s can be linked to the same canonical
/// identity — e.g. the same person on Telegram and Discord.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub identity_key: IdentityKey,
    pub platform: AdapterKind,
    pub platform_user_id: String,
    pub human_role: HumanRole,
    pub human_email: Option<String>,
    pub display_name: Option<String>,
    /// When set, this record is an alias — `resolve_canonical` follows it.
    pub canonical_identity_key: Option<IdentityKey>,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_matches_platform_and_id() {
        let record = IdentityRecord {
            identity_key: IdentityKey::new("telegram", "555"),
            platform: AdapterKind::Telegram,
            platform_user_id: "555".to_string(),
            human_role: HumanRole::Member,
            human_email: None,
            display_name: None,
            canonical_identity_key: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(record.identity_key.as_str(), "telegram:555");
    }
}
