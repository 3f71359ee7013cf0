//! Topology store
//!
//! The authoritative in-memory graph of the broker:
//! - addresses (`IpContainer`) own the clients connected from them
//! - clients own their publish edges (`PubEdge`) and remember their
//!   subscription filters
//! - topics hold subscription edges back to the clients they are delivered to
//!
//! All cross references are keys resolved through the store's dictionaries,
//! so entities can be added and removed in any order without dangling
//! references. The store has no interior locking; it expects a single writer
//! (the broker holds it behind its own lock).

use std::time::Instant;

use tracing::{debug, info};

use super::dict::HashDict;
use super::filter::topic_matches;
use super::node::{Client, ClientKey, EPSILON, IpContainer, PubEdge};
use super::topic::Topic;
use crate::utils::error::{EntityKind, GraphError};

/// Outcome of a successful store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Applied,
    /// The request repeated existing state; nothing changed.
    Ignored,
}

/// What one sampler tick did to the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SampleReport {
    pub removed_edges: usize,
    pub removed_topics: usize,
    pub changed: bool,
}

#[derive(Debug)]
pub struct TopologyStore {
    ips: HashDict<IpContainer>,
    topics: HashDict<Topic>,
    /// Idle ticks an unused edge or a retained, unpublished topic survives.
    ttl_budget: u32,
    changed: bool,
}

impl Default for TopologyStore {
    fn default() -> Self {
        Self::new(3)
    }
}

fn find_client_mut<'a>(
    ips: &'a mut HashDict<IpContainer>,
    address: &str,
    client_id: &str,
) -> Result<&'a mut Client, GraphError> {
    ips.find_mut(address)
        .ok_or_else(|| GraphError::not_found(EntityKind::Ip, address))?
        .clients
        .find_mut(client_id)
        .ok_or_else(|| GraphError::not_found(EntityKind::Client, client_id))
}

impl TopologyStore {
    pub fn new(ttl_budget: u32) -> Self {
        Self {
            ips: HashDict::new(),
            topics: HashDict::new(),
            ttl_budget,
            changed: false,
        }
    }

    pub fn ttl_budget(&self) -> u32 {
        self.ttl_budget
    }

    pub fn add_client(&mut self, address: &str, client_id: &str) -> Result<Mutation, GraphError> {
        self.add_bridge_client(address, client_id, None)
    }

    /// Adds a client, creating its address container on first use.
    ///
    /// `bridge` carries the remote broker address for bridge sessions.
    /// Re-adding a known (address, id) pair is ignored.
    pub fn add_bridge_client(
        &mut self,
        address: &str,
        client_id: &str,
        bridge: Option<&str>,
    ) -> Result<Mutation, GraphError> {
        if !self.ips.contains(address) {
            self.ips.insert(address, IpContainer::new(address))?;
            debug!("Created container for {}", address);
        }

        let ip = self
            .ips
            .find_mut(address)
            .ok_or_else(|| GraphError::not_found(EntityKind::Ip, address))?;
        if ip.clients.contains(client_id) {
            return Ok(Mutation::Ignored);
        }

        let inserted = ip
            .clients
            .insert(client_id, Client::new(address, client_id, bridge))
            .map(|_| ());
        let empty = ip.clients.is_empty();
        if let Err(e) = inserted {
            if empty {
                self.ips.remove(address);
            }
            return Err(e);
        }

        info!("Client {} connected from {}", client_id, address);
        self.changed = true;
        Ok(Mutation::Applied)
    }

    /// Removes a client with all of its edges. An address left without
    /// clients is removed too.
    pub fn remove_client(&mut self, client_id: &str, address: &str) -> Result<Mutation, GraphError> {
        let ip = self
            .ips
            .find_mut(address)
            .ok_or_else(|| GraphError::not_found(EntityKind::Ip, address))?;
        let client = ip
            .clients
            .remove(client_id)
            .ok_or_else(|| GraphError::not_found(EntityKind::Client, client_id))?;
        if ip.clients.is_empty() {
            self.ips.remove(address);
            debug!("Removed empty container {}", address);
        }

        let key = client.key();
        for topic in self.topics.values_mut() {
            topic.remove_subscriber(&key);
        }

        let budget = self.ttl_budget;
        for edge in client.published.values() {
            if let Some(topic) = self.topics.find_mut(&edge.topic) {
                topic.detach_publisher(budget);
            }
        }

        info!("Client {} from {} removed", client_id, address);
        self.changed = true;
        Ok(Mutation::Applied)
    }

    /// Records `payload_len` bytes published by a client to `topic_name`.
    ///
    /// Creates the topic and the publish edge on first use and refreshes the
    /// edge's idle TTL.
    pub fn add_publish(
        &mut self,
        client_id: &str,
        address: &str,
        topic_name: &str,
        retain: bool,
        payload_len: u64,
    ) -> Result<Mutation, GraphError> {
        find_client_mut(&mut self.ips, address, client_id)?;

        let created_topic = !self.topics.contains(topic_name);
        if created_topic {
            self.topics.insert(topic_name, Topic::new(topic_name, retain))?;
            self.match_subscribers(topic_name);
            debug!("Created topic {}", topic_name);
        }

        let ttl = i64::from(self.ttl_budget);
        let client = find_client_mut(&mut self.ips, address, client_id)?;
        let new_edge = match client.published.find_mut(topic_name) {
            Some(edge) => {
                edge.bytes += payload_len;
                edge.ttl = ttl;
                false
            }
            None => {
                let mut edge = PubEdge::new(topic_name, ttl);
                edge.bytes = payload_len;
                if let Err(e) = client.published.insert(topic_name, edge) {
                    if created_topic {
                        self.topics.remove(topic_name);
                    }
                    return Err(e);
                }
                true
            }
        };

        let topic = self
            .topics
            .find_mut(topic_name)
            .ok_or_else(|| GraphError::not_found(EntityKind::Topic, topic_name))?;
        topic.bytes += payload_len;
        topic.retain = retain;
        if new_edge {
            topic.attach_publisher();
            debug!("{} now publishes to {}", client_id, topic_name);
            self.changed = true;
        }
        Ok(Mutation::Applied)
    }

    /// Adds subscription edges from every known topic matching `filter` to
    /// the client, and remembers the filter for topics created later.
    pub fn add_subscription(
        &mut self,
        client_id: &str,
        address: &str,
        filter: &str,
    ) -> Result<Mutation, GraphError> {
        let client = find_client_mut(&mut self.ips, address, client_id)?;
        if client.filters.iter().any(|f| f == filter) {
            return Ok(Mutation::Ignored);
        }
        client.filters.push(filter.to_string());

        let key = client.key();
        let mut added = 0;
        for topic in self.topics.values_mut() {
            if topic_matches(filter, &topic.name) && topic.add_subscriber(key.clone()) {
                added += 1;
            }
        }

        debug!("{} subscribed to {} ({} topics)", client_id, filter, added);
        if added > 0 {
            self.changed = true;
        }
        Ok(Mutation::Applied)
    }

    /// Forgets `filter` and drops the subscription edges it produced, except
    /// where another filter of the same client still matches.
    pub fn remove_subscription(
        &mut self,
        client_id: &str,
        address: &str,
        filter: &str,
    ) -> Result<Mutation, GraphError> {
        let client = find_client_mut(&mut self.ips, address, client_id)?;
        let before = client.filters.len();
        client.filters.retain(|f| f != filter);
        if client.filters.len() == before {
            return Ok(Mutation::Ignored);
        }

        let key = client.key();
        let mut removed = 0;
        for topic in self.topics.values_mut() {
            if topic_matches(filter, &topic.name)
                && !client.subscribes_to(&topic.name)
                && topic.remove_subscriber(&key)
            {
                removed += 1;
            }
        }

        debug!("{} unsubscribed from {} ({} topics)", client_id, filter, removed);
        if removed > 0 {
            self.changed = true;
        }
        Ok(Mutation::Applied)
    }

    pub fn latency_probe_start(
        &mut self,
        client_id: &str,
        address: &str,
        now: Instant,
    ) -> Result<Mutation, GraphError> {
        find_client_mut(&mut self.ips, address, client_id)?
            .latency
            .start(now);
        Ok(Mutation::Applied)
    }

    /// Completes a latency probe. A probe end without a start is ignored.
    pub fn latency_probe_end(
        &mut self,
        client_id: &str,
        address: &str,
        now: Instant,
    ) -> Result<Mutation, GraphError> {
        let client = find_client_mut(&mut self.ips, address, client_id)?;
        match client.latency.end(now) {
            Some(ms) => {
                debug!("Latency sample for {}: {:.3} ms", client_id, ms);
                Ok(Mutation::Applied)
            }
            None => Ok(Mutation::Ignored),
        }
    }

    /// One sampler tick over `elapsed_secs` seconds: turns byte counters into
    /// rates, expires idle edges and drained topics.
    pub fn sample(&mut self, elapsed_secs: f64) -> SampleReport {
        let mut report = SampleReport::default();
        if elapsed_secs <= 0.0 || !elapsed_secs.is_finite() {
            return report;
        }

        let budget = self.ttl_budget;
        let mut values_changed = false;

        for ip in self.ips.values_mut() {
            for client in ip.clients.values_mut() {
                values_changed |= client.latency.fold();

                let expired = client.published.remove_where(|_, edge| {
                    let bps = edge.bytes as f64 / elapsed_secs;
                    edge.bytes = 0;
                    edge.ttl -= 1;
                    values_changed |= (bps - edge.bps).abs() > EPSILON;
                    edge.bps = bps;
                    bps.abs() < EPSILON && edge.ttl <= 0
                });

                for (topic_name, _) in expired {
                    debug!("Publish edge {} -> {} expired", client.id, topic_name);
                    report.removed_edges += 1;
                    if let Some(topic) = self.topics.find_mut(&topic_name) {
                        topic.detach_publisher(budget);
                    }
                }
            }
        }

        let gone = self.topics.remove_where(|_, topic| topic.drain_tick());
        for (name, _) in &gone {
            debug!("Topic {} expired", name);
        }
        report.removed_topics = gone.len();

        for topic in self.topics.values_mut() {
            let bps = topic.bytes as f64 / elapsed_secs;
            topic.bytes = 0;
            values_changed |= (bps - topic.bps).abs() > EPSILON;
            topic.bps = bps;
        }

        report.changed =
            values_changed || report.removed_edges > 0 || report.removed_topics > 0;
        if report.changed {
            self.changed = true;
        }
        report
    }

    /// Creates subscription edges to a freshly created topic from every
    /// client whose filters match it.
    fn match_subscribers(&mut self, topic_name: &str) {
        let Some(topic) = self.topics.find_mut(topic_name) else {
            return;
        };
        for ip in self.ips.values() {
            for client in ip.clients.values() {
                if client.subscribes_to(topic_name) {
                    topic.add_subscriber(client.key());
                }
            }
        }
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Returns the changed flag and clears it.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    pub fn ips(&self) -> impl Iterator<Item = &IpContainer> {
        self.ips.values()
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.values()
    }

    pub fn ip(&self, address: &str) -> Option<&IpContainer> {
        self.ips.find(address)
    }

    pub fn client(&self, address: &str, client_id: &str) -> Option<&Client> {
        self.ips.find(address)?.clients.find(client_id)
    }

    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.find(name)
    }

    pub fn ip_count(&self) -> usize {
        self.ips.len()
    }

    pub fn client_count(&self) -> usize {
        self.ips.values().map(|ip| ip.clients.len()).sum()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Counts the publish edges pointing at `topic_name` by walking every
    /// client. Equals the topic's `ref_cnt`.
    pub fn publisher_count(&self, topic_name: &str) -> usize {
        self.ips
            .values()
            .flat_map(|ip| ip.clients.values())
            .filter(|client| client.published.contains(topic_name))
            .count()
    }

    /// Subscribers of `topic_name` as `ClientKey`s.
    pub fn subscribers(&self, topic_name: &str) -> &[ClientKey] {
        self.topics
            .find(topic_name)
            .map(|t| t.subscribers.as_slice())
            .unwrap_or_default()
    }
}
