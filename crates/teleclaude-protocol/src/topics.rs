use serde::{Deserialize, Serialize};

/// The one topic defined by spec §4.8/§6 today. Kept as a string newtype
/// rather than a closed enum — the WS route is generic over topic name,
/// and a second topic (e.g. output mirroring) should not require a wire
/// format change, only a new constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic(pub String);

impl Topic {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Notification payloads pushed by the Event Platform Core's WS delivery
/// callback (spec §4.8 "topic `notifications`").
pub const NOTIFICATIONS: &str = "notifications";

/// `ReqFrame::method` body for a subscribe request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeParams {
    pub topic: String,
}

/// `ReqFrame::method` body for an unsubscribe request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeParams {
    pub topic: String,
}

pub const METHOD_SUBSCRIBE: &str = "subscribe";
pub const METHOD_UNSUBSCRIBE: &str = "unsubscribe";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_displays_as_its_name() {
        assert_eq!(Topic::from(NOTIFICATIONS).to_string(), "notifications");
    }

    #[test]
    fn subscribe_params_round_trip() {
        let json = r#"{"topic":"notifications"}"#;
        let params: SubscribeParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.topic, NOTIFICATIONS);
    }
}
