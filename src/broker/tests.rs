use super::Broker;
use super::engine::routes_to;
use super::message::Message;
use crate::client::Client;
use crate::config::GraphSettings;
use crate::transport::message::ServerMessage;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tungstenite::protocol::Message as WsMessage;

fn connect(broker: &mut Broker, address: &str) -> (String, UnboundedReceiver<WsMessage>) {
    let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(address, tx);
    let client_id = client.id.clone();
    broker.register_client(client);
    (client_id, rx)
}

fn next_server_message(rx: &mut UnboundedReceiver<WsMessage>) -> ServerMessage {
    match rx.try_recv().expect("expected a message") {
        WsMessage::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected a text message, got {other:?}"),
    }
}

#[test]
fn test_broker_new() {
    let broker = Broker::default();
    assert!(broker.clients.is_empty());
    assert!(broker.subscriptions.is_empty());
    assert_eq!(broker.graph().store().client_count(), 0);
}

#[test]
fn test_register_and_cleanup_client_updates_graph() {
    let mut broker = Broker::default();
    let (client_id, _rx) = connect(&mut broker, "10.0.0.1");

    assert!(broker.clients.contains_key(&client_id));
    assert!(broker.graph().store().client("10.0.0.1", &client_id).is_some());

    broker.cleanup_client(&client_id);
    assert!(!broker.clients.contains_key(&client_id));
    assert_eq!(broker.graph().store().ip_count(), 0);

    // second cleanup is a no-op
    broker.cleanup_client(&client_id);
}

#[test]
fn test_publish_routes_by_wildcard() {
    let mut broker = Broker::default();
    let (publisher, _pub_rx) = connect(&mut broker, "10.0.0.1");
    let (subscriber, mut sub_rx) = connect(&mut broker, "10.0.0.2");

    assert!(broker.subscribe("sensors/+", &subscriber));
    broker.publish(&publisher, Message::new("sensors/temp", "21".to_string(), false));
    broker.publish(&publisher, Message::new("actuators/fan", "on".to_string(), false));

    match next_server_message(&mut sub_rx) {
        ServerMessage::Message { topic, payload, .. } => {
            assert_eq!(topic, "sensors/temp");
            assert_eq!(payload, "21");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(sub_rx.try_recv().is_err());

    let store = broker.graph().store();
    assert_eq!(store.topic("sensors/temp").unwrap().ref_cnt, 1);
    assert_eq!(store.subscribers("sensors/temp").len(), 1);
    assert!(store.subscribers("actuators/fan").is_empty());
}

#[test]
fn test_invalid_filter_is_rejected() {
    let mut broker = Broker::default();
    let (client_id, _rx) = connect(&mut broker, "10.0.0.1");

    assert!(!broker.subscribe("a/#/b", &client_id));
    assert!(!broker.subscriptions.contains_key(&client_id));
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let mut broker = Broker::default();
    let (publisher, _pub_rx) = connect(&mut broker, "10.0.0.1");
    let (subscriber, mut sub_rx) = connect(&mut broker, "10.0.0.1");

    broker.subscribe("a/b", &subscriber);
    broker.unsubscribe("a/b", &subscriber);
    broker.publish(&publisher, Message::new("a/b", "x".to_string(), false));

    assert!(sub_rx.try_recv().is_err());
    assert!(broker.graph().store().subscribers("a/b").is_empty());
}

#[test]
fn test_publish_to_wildcard_or_empty_topic_is_rejected() {
    let mut broker = Broker::default();
    let (publisher, mut pub_rx) = connect(&mut broker, "10.0.0.1");
    let (subscriber, mut sub_rx) = connect(&mut broker, "10.0.0.2");
    assert!(broker.subscribe("a/+", &subscriber));

    for topic in ["a/+", "a/#", ""] {
        broker.publish(&publisher, Message::new(topic, "x".to_string(), false));
        assert!(matches!(
            next_server_message(&mut pub_rx),
            ServerMessage::Error { .. }
        ));
    }

    assert!(sub_rx.try_recv().is_err());
    let store = broker.graph().store();
    assert_eq!(store.topic_count(), 0);
    assert!(store.subscribers("a/+").is_empty());
    let client = store.client("10.0.0.1", &publisher).unwrap();
    assert!(client.published.is_empty());
}

#[test]
fn test_retained_message_replayed_on_subscribe() {
    let mut broker = Broker::default();
    let (publisher, _pub_rx) = connect(&mut broker, "10.0.0.1");
    broker.publish(&publisher, Message::new("state/door", "open".to_string(), true));

    let (late, mut late_rx) = connect(&mut broker, "10.0.0.2");
    broker.subscribe("state/#", &late);

    match next_server_message(&mut late_rx) {
        ServerMessage::Message {
            topic,
            payload,
            retain,
            ..
        } => {
            assert_eq!(topic, "state/door");
            assert_eq!(payload, "open");
            assert!(retain);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(broker.graph().store().topic("state/door").unwrap().retain);
}

#[test]
fn test_empty_retained_payload_clears() {
    let mut broker = Broker::default();
    let (publisher, _pub_rx) = connect(&mut broker, "10.0.0.1");
    broker.publish(&publisher, Message::new("state/door", "open".to_string(), true));
    broker.publish(&publisher, Message::new("state/door", String::new(), true));

    assert!(broker.retained.is_empty());
}

#[test]
fn test_latency_probe_round_trip() {
    let mut broker = Broker::default();
    let (client_id, mut rx) = connect(&mut broker, "10.0.0.1");
    let latency_topic = broker.settings().latency_topic.clone();

    broker.publish(&client_id, Message::new(&latency_topic, String::new(), false));
    assert!(matches!(next_server_message(&mut rx), ServerMessage::Probe {}));
    assert!(
        broker
            .graph()
            .store()
            .client("10.0.0.1", &client_id)
            .unwrap()
            .latency
            .is_pending()
    );

    broker.handle_probe_ack(&client_id);
    let client = broker.graph().store().client("10.0.0.1", &client_id).unwrap();
    assert!(!client.latency.is_pending());
    // the probe itself is not a topic in the graph
    assert_eq!(broker.graph().store().topic_count(), 0);
}

#[test]
fn test_graph_published_to_system_topic() {
    let settings = GraphSettings {
        interval_secs: 1,
        ..GraphSettings::default()
    };
    let mut broker = Broker::new(settings);
    let (watcher, mut rx) = connect(&mut broker, "10.0.0.9");
    assert!(broker.subscribe("$SYS/graph", &watcher));

    broker.publish_graph(Instant::now() + Duration::from_secs(2));

    let mut saw_graph = false;
    while let Ok(WsMessage::Text(text)) = rx.try_recv() {
        let msg: ServerMessage = serde_json::from_str(text.as_str()).unwrap();
        if let ServerMessage::Message { topic, payload, .. } = msg {
            if topic == "$SYS/graph" {
                let doc: serde_json::Value = serde_json::from_str(&payload).unwrap();
                assert_eq!(doc["ips"][0]["id"], "10.0.0.9");
                saw_graph = true;
            }
        }
    }
    assert!(saw_graph);
    assert!(broker.retained.contains_key("$SYS/graph"));
    // system topics never show up in the graph itself
    assert_eq!(broker.graph().store().topic_count(), 0);
}

#[test]
fn test_system_topic_routing() {
    assert!(routes_to("$SYS/graph", "$SYS/graph"));
    assert!(routes_to("$SYS/#", "$SYS/graph/memory"));
    assert!(!routes_to("#", "$SYS/graph"));
    assert!(!routes_to("+/graph", "$SYS/graph"));
    assert!(routes_to("a/+", "a/b"));
}

#[test]
fn test_publish_to_client_with_closed_channel() {
    let mut broker = Broker::default();
    let (publisher, _pub_rx) = connect(&mut broker, "10.0.0.1");
    let (subscriber, sub_rx) = connect(&mut broker, "10.0.0.2");
    broker.subscribe("test_topic", &subscriber);

    // Drop the receiver to close the channel
    drop(sub_rx);

    broker.publish(&publisher, Message::new("test_topic", "hello".to_string(), false));
    // No assertion, just checking for no panics and that an error is logged.
}
