use teleclaude_adapters::AdapterError;

/// Errors produced by the Telegram adapter, folded into the UCAP error
/// taxonomy at the `teleclaude_adapters::Adapter` trait boundary.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("teloxide error: {0}")]
    Teloxide(#[from] teloxide::RequestError),

    #[error("no bot token configured")]
    NoToken,

    #[error("session '{0}' has no bound telegram chat")]
    NoChatBound(String),
}

impl From<TelegramError> for AdapterError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::NoToken => AdapterError::ConfigError {
                adapter: "telegram".to_string(),
                cause: err.to_string(),
            },
            TelegramError::NoChatBound(_) => AdapterError::SessionNotFound(err.to_string()),
            TelegramError::Teloxide(_) => AdapterError::SendFailed {
                adapter: "telegram".to_string(),
                cause: err.to_string(),
            },
        }
    }
}
