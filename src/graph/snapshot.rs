//! Snapshot rendering.
//!
//! A read-only walk over the `TopologyStore` producing the graph document
//! published on the graph topic. The document types are plain serde structs;
//! the store itself never touches JSON.
//!
//! Shape:
//!
//! ```json
//! {"ips":[{"id":"1.2.3.4","clients":[{"name":"c1","latency":null,
//!   "published":[{"topic":"a/b","bps":10.0}]}]}],
//!  "topics":[{"name":"a/b","retain":false,"bps":10.0,
//!   "subscriptions":[{"client":"c2","bps":10.0}]}]}
//! ```
//!
//! Ordering follows the store's dictionaries (bucket order, then chain
//! order), so it is stable between ticks that did not resize anything.

use serde::{Deserialize, Serialize};

use super::store::TopologyStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ips: Vec<IpNode>,
    pub topics: Vec<TopicNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpNode {
    pub id: String,
    pub clients: Vec<ClientNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientNode {
    pub name: String,
    /// Milliseconds; `null` until a latency probe completed.
    pub latency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
    pub published: Vec<PublishedEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEdge {
    pub topic: String,
    pub bps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    pub name: String,
    pub retain: bool,
    pub bps: f64,
    pub subscriptions: Vec<SubscriptionEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEdge {
    pub client: String,
    pub bps: f64,
}

/// Rounds to three decimal places.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

impl Snapshot {
    pub fn render(store: &TopologyStore) -> Self {
        let ips = store
            .ips()
            .map(|ip| IpNode {
                id: ip.address.clone(),
                clients: ip
                    .clients
                    .values()
                    .map(|client| ClientNode {
                        name: client.id.clone(),
                        latency: client.latency.average().map(round3),
                        bridge: client.bridge.clone(),
                        published: client
                            .published
                            .values()
                            .map(|edge| PublishedEdge {
                                topic: edge.topic.clone(),
                                bps: round3(edge.bps),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        let topics = store
            .topics()
            .map(|topic| {
                let bps = round3(topic.bps);
                TopicNode {
                    name: topic.name.clone(),
                    retain: topic.retain,
                    bps,
                    subscriptions: topic
                        .subscribers
                        .iter()
                        .map(|key| SubscriptionEdge {
                            client: key.client_id.clone(),
                            bps,
                        })
                        .collect(),
                }
            })
            .collect();

        Self { ips, topics }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn topic(&self, name: &str) -> Option<&TopicNode> {
        self.topics.iter().find(|t| t.name == name)
    }

    pub fn client(&self, name: &str) -> Option<&ClientNode> {
        self.ips
            .iter()
            .flat_map(|ip| ip.clients.iter())
            .find(|c| c.name == name)
    }
}
