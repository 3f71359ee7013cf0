use super::pubsub_client::Client;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

#[test]
fn test_client_new() {
    let (tx, _) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new("10.0.0.1", tx);
    assert!(client.id.starts_with("client-"));
    assert_eq!(client.address, "10.0.0.1");
}

#[test]
fn test_client_ids_are_unique() {
    let (tx, _) = mpsc::unbounded_channel::<WsMessage>();
    let a = Client::new("10.0.0.1", tx.clone());
    let b = Client::new("10.0.0.1", tx);
    assert_ne!(a.id, b.id);
}
