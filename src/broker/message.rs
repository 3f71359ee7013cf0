use serde::{Deserialize, Serialize};

/// A published message as routed by the broker.
///
/// # Fields
///
/// - `topic` - The concrete topic name this message was published to.
/// - `payload` - The message body.
/// - `timestamp` - Milliseconds since the UNIX epoch, set by the broker.
/// - `retain` - Keep the message for subscribers that arrive later, and keep
///   the topic alive in the graph after its publishers leave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub timestamp: i64,
    #[serde(default)]
    pub retain: bool,
}

impl Message {
    pub fn new(topic: &str, payload: String, retain: bool) -> Self {
        Self {
            topic: topic.to_string(),
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
            retain,
        }
    }
}
