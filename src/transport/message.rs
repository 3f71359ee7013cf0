use serde::{Deserialize, Serialize};

use crate::broker::message::Message;

/// Requests a client sends to the server.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { topic: String },

    #[serde(rename = "unsubscribe")]
    Unsubscribe { topic: String },

    #[serde(rename = "publish")]
    Publish {
        topic: String,
        payload: String,
        #[serde(default)]
        retain: bool,
    },

    /// Answers a `probe`, closing a latency measurement.
    #[serde(rename = "probe_ack")]
    ProbeAck {},
}

/// Messages the server sends to a client.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "message")]
    Message {
        topic: String,
        payload: String,
        timestamp: i64,
        retain: bool,
    },

    /// Sent after a publish to the latency topic; expects a `probe_ack`.
    #[serde(rename = "probe")]
    Probe {},

    #[serde(rename = "error")]
    Error { message: String },
}

impl From<&Message> for ServerMessage {
    fn from(msg: &Message) -> Self {
        ServerMessage::Message {
            topic: msg.topic.clone(),
            payload: msg.payload.clone(),
            timestamp: msg.timestamp,
            retain: msg.retain,
        }
    }
}
