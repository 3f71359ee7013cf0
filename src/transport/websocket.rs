//! WebSocket transport
//!
//! Accepts TCP/WebSocket connections, registers a `Client` (tagged with the
//! peer's IP address) for each one, and translates protocol JSON messages
//! into broker operations. The broker lock is never held across network I/O.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::message::Message;
use crate::broker::{Broker, SharedBroker, lock};
use crate::client::Client;
use crate::transport::message::{ClientMessage, ServerMessage};

/// Binds `addr` and serves WebSocket clients until the listener fails.
pub async fn start_websocket_server(addr: &str, broker: SharedBroker) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server listening on ws://{}", addr);
    serve(listener, broker).await;
    Ok(())
}

/// Applies one parsed client request to the broker.
pub fn dispatch(broker: &mut Broker, client_id: &str, msg: ClientMessage) {
    match msg {
        ClientMessage::Subscribe { topic } => {
            if !broker.subscribe(&topic, client_id) {
                reply_error(broker, client_id, format!("invalid filter: {topic}"));
            }
        }
        ClientMessage::Unsubscribe { topic } => broker.unsubscribe(&topic, client_id),
        ClientMessage::Publish {
            topic,
            payload,
            retain,
        } => broker.publish(client_id, Message::new(&topic, payload, retain)),
        ClientMessage::ProbeAck {} => broker.handle_probe_ack(client_id),
    }
}

fn reply_error(broker: &Broker, client_id: &str, message: String) {
    let Some(client) = broker.clients.get(client_id) else {
        return;
    };
    match serde_json::to_string(&ServerMessage::Error { message }) {
        Ok(json) => {
            if let Err(e) = client.sender.send(WsMessage::text(json)) {
                warn!("Failed to send error reply to {}: {}", client_id, e);
            }
        }
        Err(e) => warn!("Failed to serialize error reply: {}", e),
    }
}

pub async fn serve(listener: TcpListener, broker: SharedBroker) {
    while let Ok((stream, peer)) = listener.accept().await {
        let broker = broker.clone();
        let address = peer.ip().to_string();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake error from {}: {}", address, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

            // Register client before doing anything else
            let client = Client::new(&address, tx);
            let client_id = client.id.clone();
            lock(&broker).register_client(client);

            // Forward messages from broker -> client
            let client_id_clone = client_id.clone();
            spawn(async move {
                while let Some(msg) = rx.recv().await {
                    if let Err(e) = ws_sender.send(msg).await {
                        warn!("Failed to send message to {}: {}", client_id_clone, e);
                        break;
                    }
                }
                debug!("Send loop closed for {}", client_id_clone);
            });

            while let Some(Ok(msg)) = ws_receiver.next().await {
                if !msg.is_text() {
                    continue;
                }
                let Ok(text) = msg.to_text() else {
                    continue;
                };
                match serde_json::from_str::<ClientMessage>(text) {
                    Ok(request) => dispatch(&mut lock(&broker), &client_id, request),
                    Err(err) => {
                        warn!(
                            "Invalid client message from {}: {} | {}",
                            client_id,
                            err,
                            text.chars().take(100).collect::<String>()
                        );
                    }
                }
            }

            info!("{} disconnected", client_id);
            lock(&broker).cleanup_client(&client_id);
        });
    }
}
