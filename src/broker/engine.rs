use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::message::Message;
use crate::client::Client;
use crate::config::GraphSettings;
use crate::graph::GraphMonitor;
use crate::graph::filter::{is_valid_filter, is_valid_topic_name, topic_matches};
use crate::transport::message::ServerMessage;

pub type ClientId = String;
pub type SharedBroker = Arc<Mutex<Broker>>;

/// Locks the shared broker. A poisoned lock is taken over as is: the broker
/// state is plain data and stays usable.
pub fn lock(broker: &SharedBroker) -> MutexGuard<'_, Broker> {
    broker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routing rule for delivery. Ordinary topics follow the wildcard rules;
/// `$` system topics are only delivered to filters that spell out their
/// first level.
pub fn routes_to(filter: &str, topic: &str) -> bool {
    if !topic.starts_with('$') {
        return topic_matches(filter, topic);
    }
    match (filter.split_once('/'), topic.split_once('/')) {
        (Some((filter_root, filter_rest)), Some((topic_root, topic_rest))) => {
            filter_root == topic_root
                && (filter_rest == topic_rest || topic_matches(filter_rest, topic_rest))
        }
        _ => filter == topic,
    }
}

/// Represents the broker that routes messages between connected clients.
///
/// Every connection, subscription and publish is also reported to the
/// `GraphMonitor`, and the graph loop publishes the rendered topology on the
/// configured system topic like any other retained message.
#[derive(Debug)]
pub struct Broker {
    pub clients: HashMap<ClientId, Client>,
    pub subscriptions: HashMap<ClientId, HashSet<String>>,
    pub retained: HashMap<String, Message>,
    graph: GraphMonitor,
    settings: GraphSettings,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(GraphSettings::default())
    }
}

impl Broker {
    pub fn new(settings: GraphSettings) -> Self {
        Self {
            clients: HashMap::new(),
            subscriptions: HashMap::new(),
            retained: HashMap::new(),
            graph: GraphMonitor::new(&settings, Instant::now()),
            settings,
        }
    }

    pub fn graph(&self) -> &GraphMonitor {
        &self.graph
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// Registers a new client and adds it to the graph.
    pub fn register_client(&mut self, client: Client) {
        self.graph.on_connect(&client.id, &client.address, None);
        self.clients.insert(client.id.clone(), client);
    }

    /// Removes a client from the routing table only.
    pub fn remove_client(&mut self, client_id: &str) -> Option<Client> {
        self.subscriptions.remove(client_id);
        self.clients.remove(client_id)
    }

    /// Removes a client, its subscriptions and its graph node.
    pub fn cleanup_client(&mut self, client_id: &str) {
        match self.remove_client(client_id) {
            Some(client) => {
                self.graph.on_disconnect(&client.id, &client.address);
                info!("Cleaned up client {}", client_id);
            }
            None => debug!("Client {} already cleaned up", client_id),
        }
    }

    fn address_of(&self, client_id: &str) -> Option<String> {
        self.clients.get(client_id).map(|c| c.address.clone())
    }

    /// Subscribes a client to a filter and replays matching retained
    /// messages. Returns false for unknown clients or malformed filters.
    pub fn subscribe(&mut self, filter: &str, client_id: &str) -> bool {
        if !is_valid_filter(filter) {
            warn!("Rejecting invalid filter {:?} from {}", filter, client_id);
            return false;
        }
        let Some(address) = self.address_of(client_id) else {
            warn!("Subscribe from unknown client {}", client_id);
            return false;
        };

        self.subscriptions
            .entry(client_id.to_string())
            .or_default()
            .insert(filter.to_string());
        self.graph.on_subscribe(client_id, &address, filter);

        if let Some(client) = self.clients.get(client_id) {
            for retained in self.retained.values() {
                if routes_to(filter, &retained.topic) {
                    send(client, &ServerMessage::from(retained));
                }
            }
        }
        true
    }

    pub fn unsubscribe(&mut self, filter: &str, client_id: &str) {
        let removed = self
            .subscriptions
            .get_mut(client_id)
            .is_some_and(|filters| filters.remove(filter));
        if !removed {
            debug!("{} was not subscribed to {}", client_id, filter);
            return;
        }
        if let Some(address) = self.address_of(client_id) {
            self.graph.on_unsubscribe(client_id, &address, filter);
        }
    }

    /// Publishes a message from a client. Topic names holding wildcards (or
    /// empty ones) are answered with an `error` and dropped.
    ///
    /// A publish to the latency topic starts a probe instead: the client gets
    /// a `probe` back and its `probe_ack` closes the measurement.
    pub fn publish(&mut self, client_id: &str, msg: Message) {
        let Some(address) = self.address_of(client_id) else {
            warn!("Publish from unknown client {}", client_id);
            return;
        };

        if !is_valid_topic_name(&msg.topic) {
            warn!("Rejecting publish to {:?} from {}", msg.topic, client_id);
            if let Some(client) = self.clients.get(client_id) {
                let message = format!("invalid topic name: {}", msg.topic);
                send(client, &ServerMessage::Error { message });
            }
            return;
        }

        if msg.topic == self.settings.latency_topic {
            self.graph
                .on_latency_probe_start(client_id, &address, Instant::now());
            if let Some(client) = self.clients.get(client_id) {
                send(client, &ServerMessage::Probe {});
            }
            return;
        }

        self.graph
            .on_publish(client_id, &address, &msg.topic, msg.retain, msg.payload.len());
        self.route(msg);
    }

    pub fn handle_probe_ack(&mut self, client_id: &str) {
        if let Some(address) = self.address_of(client_id) {
            self.graph
                .on_latency_probe_end(client_id, &address, Instant::now());
        }
    }

    /// Stores retained messages and delivers to every matching subscriber.
    fn route(&mut self, msg: Message) {
        if msg.retain {
            if msg.payload.is_empty() {
                self.retained.remove(&msg.topic);
            } else {
                self.retained.insert(msg.topic.clone(), msg.clone());
            }
        }

        let outbound = ServerMessage::from(&msg);
        let mut delivered = 0;
        for (sub_id, filters) in &self.subscriptions {
            if !filters.iter().any(|f| routes_to(f, &msg.topic)) {
                continue;
            }
            match self.clients.get(sub_id) {
                Some(client) => {
                    send(client, &outbound);
                    delivered += 1;
                }
                None => warn!("No client registered with id: {}", sub_id),
            }
        }
        debug!("Delivered {} to {} subscribers", msg.topic, delivered);
    }

    /// Runs one graph tick and publishes whatever documents it produced.
    pub fn publish_graph(&mut self, now: Instant) {
        let update = self.graph.on_tick(now);
        if let Some(graph) = update.graph {
            let topic = self.settings.topic.clone();
            self.route(Message::new(&topic, graph, true));
        }
        if let Some(memory) = update.memory {
            let topic = self.settings.memory_topic.clone();
            self.route(Message::new(&topic, memory, true));
        }
    }

    /// Periodically drives `publish_graph`. Returns immediately when the
    /// sampling interval is zero.
    pub async fn start_graph_loop(broker: SharedBroker) {
        let interval = lock(&broker).graph.interval();
        if interval.is_zero() {
            info!("Graph publishing disabled");
            return;
        }

        loop {
            tokio::time::sleep(interval).await;
            lock(&broker).publish_graph(Instant::now());
        }
    }
}

fn send(client: &Client, msg: &ServerMessage) {
    let text = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize message: {}", e);
            return;
        }
    };
    if let Err(e) = client.sender.send(WsMessage::text(text)) {
        warn!("Failed to send to {}: {}", client.id, e);
    }
}
