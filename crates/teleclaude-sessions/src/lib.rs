//! Session Store + Session Manager (spec §3, §4.4).

pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::{Result, SessionError};
pub use manager::{SessionManager, STICKY_SET_CAP};
pub use types::{RelayStatus, ResumeKind, Session, SessionStatus};
