use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// REST adapter socket path (spec §6).
pub const DEFAULT_API_SOCKET: &str = "/tmp/teleclaude-api.sock";
/// Tool Server socket path (spec §4.6/§6) — distinct from the REST socket.
pub const DEFAULT_TOOL_SOCKET: &str = "/tmp/teleclaude-tools.sock";
/// Output-pipeline poll cadence (spec §4.2).
pub const OUTPUT_POLL_INTERVAL_MS: u64 = 1_000;
/// Admin session idle timeout before `/compact` injection (spec §4.4).
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;
/// Customer session inactivity sweep (spec §4.4) — never the idle timeout.
pub const CUSTOMER_SWEEP_SECS: u64 = 72 * 60 * 60;
/// Sticky-set membership cap (spec §4.4).
pub const STICKY_SET_CAP: usize = 5;
/// Heartbeat publish cadence (spec §4.5).
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 10;
/// Peer TTL multiplier over the heartbeat interval (spec §4.5).
pub const HEARTBEAT_TTL_MULTIPLIER: u64 = 3;
/// Per-adapter outbound call timeout (spec §5).
pub const ADAPTER_CALL_TIMEOUT_SECS: u64 = 30;
/// Cross-machine command dispatch timeout (spec §5).
pub const CROSS_MACHINE_TIMEOUT_SECS: u64 = 120;
/// Stream trim ceiling shared by `events`, `heartbeat`, `commands:*`,
/// `output:*` (spec §4.5/§4.8).
pub const DEFAULT_STREAM_MAXLEN: usize = 10_000;

/// Top-level config: `teleclaude.toml` + `TELECLAUDE_*` env overrides
/// (spec §6 environment variables).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleClaudeConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub mesh: MeshConfig,
    #[serde(default)]
    pub sockets: SocketsConfig,
    #[serde(default)]
    pub session_policy: SessionPolicyConfig,
    /// Path to the secrets file holding adapter tokens. Tokens are never
    /// read from the environment (spec §6: "adapter tokens are supplied
    /// through a separate secrets file, not environment").
    #[serde(default = "default_secrets_path")]
    pub secrets_path: String,
    /// Root directory `list_projects` scans one level deep for candidate
    /// project directories (spec §4.1 `list_projects(computer)`).
    #[serde(default = "default_projects_root")]
    pub projects_root: String,
}

impl Default for TeleClaudeConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            mesh: MeshConfig::default(),
            sockets: SocketsConfig::default(),
            session_policy: SessionPolicyConfig::default(),
            secrets_path: default_secrets_path(),
            projects_root: default_projects_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `teleclaude.db` — sessions, peer cache, adapter bookkeeping, identity.
    #[serde(default = "default_teleclaude_db_path")]
    pub teleclaude_db_path: String,
    /// `events.db` — notifications, kept in a separate file per spec §6.
    #[serde(default = "default_events_db_path")]
    pub events_db_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            teleclaude_db_path: default_teleclaude_db_path(),
            events_db_path: default_events_db_path(),
        }
    }
}

/// Built from `TELECLAUDE_LOG_LEVEL` / `TELECLAUDE_THIRD_PARTY_LOG_LEVEL` /
/// `TELECLAUDE_THIRD_PARTY_LOGGERS` into a `tracing_subscriber::EnvFilter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_level")]
    pub third_party_log_level: String,
    /// Crate/module prefixes considered "third party" for the purposes of
    /// `third_party_log_level` (e.g. `["hyper", "tungstenite"]`).
    #[serde(default)]
    pub third_party_loggers: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            third_party_log_level: default_log_level(),
            third_party_loggers: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Render into an `EnvFilter` directive string, e.g.
    /// `"info,hyper=warn,tungstenite=warn"`.
    pub fn to_env_filter_directive(&self) -> String {
        let mut directive = self.level.clone();
        for logger in &self.third_party_loggers {
            directive.push_str(&format!(",{logger}={}", self.third_party_log_level));
        }
        directive
    }
}

/// Cross-Machine Transport configuration (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// This machine's identity in the peer registry and `commands:{machine}`.
    #[serde(default = "default_machine_name")]
    pub machine_name: String,
    /// Stream server URL (Redis connection string).
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_stream_maxlen")]
    pub stream_maxlen: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            machine_name: default_machine_name(),
            stream_url: default_stream_url(),
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            stream_maxlen: DEFAULT_STREAM_MAXLEN,
        }
    }
}

impl MeshConfig {
    /// TTL after which a peer without a fresh heartbeat is considered
    /// offline — 3x the heartbeat period per spec §4.5.
    pub fn heartbeat_ttl_secs(&self) -> u64 {
        self.heartbeat_interval_secs * HEARTBEAT_TTL_MULTIPLIER
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketsConfig {
    #[serde(default = "default_api_socket")]
    pub api_socket_path: String,
    #[serde(default = "default_tool_socket")]
    pub tool_socket_path: String,
}

impl Default for SocketsConfig {
    fn default() -> Self {
        Self {
            api_socket_path: default_api_socket(),
            tool_socket_path: default_tool_socket(),
        }
    }
}

/// Session Manager lifecycle policy (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPolicyConfig {
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_customer_sweep")]
    pub customer_sweep_secs: u64,
    #[serde(default = "default_sticky_cap")]
    pub sticky_set_cap: usize,
}

impl Default for SessionPolicyConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            customer_sweep_secs: CUSTOMER_SWEEP_SECS,
            sticky_set_cap: STICKY_SET_CAP,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_heartbeat_interval() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_SECS
}
fn default_stream_maxlen() -> usize {
    DEFAULT_STREAM_MAXLEN
}
fn default_idle_timeout() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}
fn default_customer_sweep() -> u64 {
    CUSTOMER_SWEEP_SECS
}
fn default_sticky_cap() -> usize {
    STICKY_SET_CAP
}
fn default_api_socket() -> String {
    DEFAULT_API_SOCKET.to_string()
}
fn default_tool_socket() -> String {
    DEFAULT_TOOL_SOCKET.to_string()
}
fn default_stream_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_machine_name() -> String {
    hostname_fallback()
}

fn hostname_fallback() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "local".to_string())
}

fn teleclaude_home() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.teleclaude")
}

fn default_teleclaude_db_path() -> String {
    std::env::var("TELECLAUDE_DB_PATH").unwrap_or_else(|_| format!("{}/teleclaude.db", teleclaude_home()))
}
fn default_events_db_path() -> String {
    format!("{}/events.db", teleclaude_home())
}
fn default_secrets_path() -> String {
    format!("{}/secrets.toml", teleclaude_home())
}
fn default_config_path() -> String {
    format!("{}/teleclaude.toml", teleclaude_home())
}
fn default_projects_root() -> String {
    std::env::var("HOME").map(|h| format!("{h}/projects")).unwrap_or_else(|_| "/projects".to_string())
}

impl TeleClaudeConfig {
    /// Load config from a TOML file with `TELECLAUDE_*` env var overrides.
    ///
    /// Checks in order: explicit path argument, then `~/.teleclaude/teleclaude.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: TeleClaudeConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TELECLAUDE_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

/// Adapter credentials — loaded only from `secrets_path`, never from
/// `TELECLAUDE_*` env vars (spec §6: "adapter tokens are supplied through a
/// separate secrets file, not environment").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterSecrets {
    #[serde(default)]
    pub telegram: Option<TelegramSecrets>,
    #[serde(default)]
    pub discord: Option<DiscordSecrets>,
    #[serde(default)]
    pub whatsapp: Option<WhatsappSecrets>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSecrets {
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordSecrets {
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsappSecrets {
    pub access_token: String,
    pub phone_number_id: String,
    pub verify_token: String,
    pub app_secret: String,
}

impl AdapterSecrets {
    pub fn load(secrets_path: &str) -> crate::error::Result<Self> {
        Figment::new()
            .merge(Toml::file(secrets_path))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))
    }
}
