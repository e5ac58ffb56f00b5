use teleclaude_adapters::AdapterError;

/// Errors produced by the WhatsApp Business Cloud API adapter.
#[derive(Debug, thiserror::Error)]
pub enum WhatsappError {
    #[error("whatsapp api error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("no access token configured")]
    NoToken,

    #[error("session '{0}' has no bound whatsapp conversation")]
    NoConversationBound(String),

    #[error("webhook signature verification failed")]
    BadSignature,
}

impl From<WhatsappError> for AdapterError {
    fn from(err: WhatsappError) -> Self {
        match err {
            WhatsappError::NoToken => AdapterError::ConfigError {
                adapter: "whatsapp".to_string(),
                cause: err.to_string(),
            },
            WhatsappError::NoConversationBound(_) => AdapterError::SessionNotFound(err.to_string()),
            WhatsappError::BadSignature => AdapterError::AuthFailed {
                adapter: "whatsapp".to_string(),
                cause: err.to_string(),
            },
            WhatsappError::Api { .. } | WhatsappError::Reqwest(_) => AdapterError::SendFailed {
                adapter: "whatsapp".to_string(),
                cause: err.to_string(),
            },
        }
    }
}
