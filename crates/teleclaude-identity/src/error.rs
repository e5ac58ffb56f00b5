use teleclaude_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("only admins may link or re-role identities")]
    PermissionDenied,

    #[error("corrupt identity row: {0}")]
    Corrupt(String),
}

impl Classify for IdentityError {
    fn classify(&self) -> ErrorKind {
        match self {
            IdentityError::NotFound(_) => ErrorKind::NotFound,
            IdentityError::Database(_) => ErrorKind::TransientTransport,
            IdentityError::PermissionDenied => ErrorKind::ContractViolation,
            IdentityError::Corrupt(_) => ErrorKind::StaleState,
        }
    }
}

pub type Result<T> = std::result::Result<T, IdentityError>;
