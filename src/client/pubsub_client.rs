use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;

/// Represents a connected WebSocket client in the Pub/Sub system.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for the client (`client-<uuid>`).
    pub id: String,

    /// IP address the connection came from. Groups clients in the graph.
    pub address: String,

    /// Channel to send WebSocket messages to the client.
    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    pub fn new(address: &str, sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("client-{}", uuid::Uuid::new_v4()),
            address: address.to_string(),
            sender,
        }
    }
}
