#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("no handler for topic {0}")]
    UnknownTopic(String),

    #[error("malformed payload on topic {topic}")]
    Decode {
        topic: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("handler for topic {topic} failed")]
    Handler {
        topic: &'static str,
        #[source]
        source: sprout_services::Error,
    },

    #[error("invalid broker url: {0}")]
    BrokerUrl(String),

    #[error("subscribing to {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },

    /// The bus stayed unreachable for every allowed reconnect attempt.
    #[error("bus unreachable after {attempts} reconnect attempts")]
    ReconnectExhausted {
        attempts: u32,
        #[source]
        last: anyhow::Error,
    },
}
