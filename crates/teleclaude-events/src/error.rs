use teleclaude_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventsError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("stream transport error: {0}")]
    Stream(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("notification not found: {0}")]
    NotificationNotFound(String),
}

impl Classify for EventsError {
    fn classify(&self) -> ErrorKind {
        match self {
            EventsError::Database(_) => ErrorKind::StaleState,
            EventsError::Stream(_) => ErrorKind::TransientTransport,
            EventsError::Serialization(_) => ErrorKind::InvalidInput,
            EventsError::UnknownEventType(_) => ErrorKind::InvalidInput,
            EventsError::NotificationNotFound(_) => ErrorKind::NotFound,
        }
    }
}

pub type Result<T> = std::result::Result<T, EventsError>;
