use teleclaude_adapters::AdapterError;

/// Errors produced by the Discord adapter, folded into the UCAP error
/// taxonomy at the `teleclaude_adapters::Adapter` trait boundary.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("no bot token configured")]
    NoToken,

    #[error("session '{0}' has no bound discord channel")]
    NoChannelBound(String),
}

impl From<DiscordError> for AdapterError {
    fn from(err: DiscordError) -> Self {
        match err {
            DiscordError::NoToken => AdapterError::ConfigError {
                adapter: "discord".to_string(),
                cause: err.to_string(),
            },
            DiscordError::NoChannelBound(_) => AdapterError::SessionNotFound(err.to_string()),
            DiscordError::Serenity(_) => AdapterError::SendFailed {
                adapter: "discord".to_string(),
                cause: err.to_string(),
            },
        }
    }
}
