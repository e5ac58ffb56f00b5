use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a session (UUIDv7 — time-sortable for log correlation
/// and for `ORDER BY id` to double as `ORDER BY created_at`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The name of a machine participating in the mesh. Doubles as the peer
/// identity and as the `{machine}` component of `commands:{machine}` streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MachineName(pub String);

impl MachineName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MachineName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MachineName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Primary key for a projected notification row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NotificationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifies an adapter kind. Spec §3: one of `telegram`, `discord`,
/// `whatsapp`, `web`, `rest`, `redis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Telegram,
    Discord,
    Whatsapp,
    Web,
    Rest,
    Redis,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Telegram => "telegram",
            AdapterKind::Discord => "discord",
            AdapterKind::Whatsapp => "whatsapp",
            AdapterKind::Web => "web",
            AdapterKind::Rest => "rest",
            AdapterKind::Redis => "redis",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AdapterKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "telegram" => Ok(AdapterKind::Telegram),
            "discord" => Ok(AdapterKind::Discord),
            "whatsapp" => Ok(AdapterKind::Whatsapp),
            "web" => Ok(AdapterKind::Web),
            "rest" => Ok(AdapterKind::Rest),
            "redis" => Ok(AdapterKind::Redis),
            other => Err(format!("unknown adapter kind: {other}")),
        }
    }
}

/// Six-tier human role hierarchy from spec §3, strictest last.
///
/// `customer` is the most restrictive tier seen by the Tool Server's role
/// gate (§4.6) — it excludes every tool except `escalate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HumanRole {
    Admin,
    #[default]
    Member,
    Contributor,
    Newcomer,
    Customer,
    Unauthorized,
}

impl HumanRole {
    pub fn is_customer(&self) -> bool {
        matches!(self, HumanRole::Customer)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, HumanRole::Admin)
    }
}

impl fmt::Display for HumanRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HumanRole::Admin => "admin",
            HumanRole::Member => "member",
            HumanRole::Contributor => "contributor",
            HumanRole::Newcomer => "newcomer",
            HumanRole::Customer => "customer",
            HumanRole::Unauthorized => "unauthorized",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for HumanRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admin" => Ok(HumanRole::Admin),
            "member" => Ok(HumanRole::Member),
            "contributor" => Ok(HumanRole::Contributor),
            "newcomer" => Ok(HumanRole::Newcomer),
            "customer" => Ok(HumanRole::Customer),
            "unauthorized" => Ok(HumanRole::Unauthorized),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// `{platform}:{platform_user_id}` identity scoping key (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey(pub String);

impl IdentityKey {
    pub fn new(platform: &str, platform_user_id: &str) -> Self {
        Self(format!("{platform}:{platform_user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three agent CLIs a pane may run (spec §3, §4.1 "three execution
/// modes" generalised to "three agent variants").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentVariant {
    Claude,
    Gemini,
    Codex,
}

impl AgentVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentVariant::Claude => "claude",
            AgentVariant::Gemini => "gemini",
            AgentVariant::Codex => "codex",
        }
    }

    /// The binary invoked to launch a pane running this variant.
    pub fn binary_name(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for AgentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "claude" => Ok(AgentVariant::Claude),
            "gemini" => Ok(AgentVariant::Gemini),
            "codex" => Ok(AgentVariant::Codex),
            other => Err(format!("unknown agent variant: {other}")),
        }
    }
}

/// Reasoning-effort dial surfaced to the agent CLI at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingMode {
    Fast,
    #[default]
    Medium,
    Slow,
    Deep,
}

impl ThinkingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingMode::Fast => "fast",
            ThinkingMode::Medium => "medium",
            ThinkingMode::Slow => "slow",
            ThinkingMode::Deep => "deep",
        }
    }
}

impl fmt::Display for ThinkingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ThinkingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fast" => Ok(ThinkingMode::Fast),
            "medium" => Ok(ThinkingMode::Medium),
            "slow" => Ok(ThinkingMode::Slow),
            "deep" => Ok(ThinkingMode::Deep),
            other => Err(format!("unknown thinking mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_variant_roundtrips_through_display_and_parse() {
        for variant in [AgentVariant::Claude, AgentVariant::Gemini, AgentVariant::Codex] {
            assert_eq!(variant.to_string().parse::<AgentVariant>().unwrap(), variant);
        }
    }

    #[test]
    fn thinking_mode_defaults_to_medium() {
        assert_eq!(ThinkingMode::default(), ThinkingMode::Medium);
    }

    #[test]
    fn adapter_kind_roundtrips_through_display_and_parse() {
        for kind in [
            AdapterKind::Telegram,
            AdapterKind::Discord,
            AdapterKind::Whatsapp,
            AdapterKind::Web,
            AdapterKind::Rest,
            AdapterKind::Redis,
        ] {
            let s = kind.to_string();
            assert_eq!(s.parse::<AdapterKind>().unwrap(), kind);
        }
    }

    #[test]
    fn identity_key_formats_platform_and_id() {
        let key = IdentityKey::new("telegram", "12345");
        assert_eq!(key.as_str(), "telegram:12345");
    }

    #[test]
    fn human_role_customer_is_strictest() {
        assert!(HumanRole::Customer.is_customer());
        assert!(!HumanRole::Admin.is_customer());
    }
}
