pub mod config;
pub mod error;
pub mod types;

pub use config::TeleClaudeConfig;
pub use error::{Classify, CoreError, ErrorKind, Result};
pub use types::{
    AdapterKind, AgentVariant, HumanRole, IdentityKey, MachineName, NotificationId, SessionId,
    ThinkingMode,
};
