//! Protocol hook integration.
//!
//! `GraphMonitor` is what the broker talks to. It owns the topology store,
//! the sampler and the memory reporter, translates protocol events into
//! store mutations and turns sampler ticks into documents ready to publish.
//!
//! Store errors are logged and dropped here: a `NotFound` means the protocol
//! layer reported events out of order, which must not take the broker down.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use super::sampler::Sampler;
use super::snapshot::Snapshot;
use super::store::{Mutation, TopologyStore};
use crate::config::GraphSettings;
use crate::utils::error::GraphError;
use crate::utils::memory::{self, MemoryReporter, MemoryUsage};

/// Documents produced by one tick. Either part is `None` when it did not
/// change since it was last produced.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GraphUpdate {
    pub graph: Option<String>,
    pub memory: Option<String>,
}

impl GraphUpdate {
    pub fn is_empty(&self) -> bool {
        self.graph.is_none() && self.memory.is_none()
    }
}

#[derive(Debug)]
pub struct GraphMonitor {
    store: TopologyStore,
    sampler: Sampler,
    memory: MemoryReporter,
    memory_source: fn() -> MemoryUsage,
}

fn log_failure(op: &str, result: Result<Mutation, GraphError>) {
    if let Err(e) = result {
        warn!("Graph {} dropped: {}", op, e);
    }
}

fn to_json<T: Serialize>(what: &str, value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!("Failed to serialize {}: {}", what, e);
            None
        }
    }
}

impl GraphMonitor {
    pub fn new(settings: &GraphSettings, start: Instant) -> Self {
        Self {
            store: TopologyStore::new(settings.ttl_multiplier),
            sampler: Sampler::new(Duration::from_secs(settings.interval_secs), start),
            memory: MemoryReporter::new(),
            memory_source: memory::usage,
        }
    }

    /// Replaces the allocator counters as the memory source.
    pub fn with_memory_source(mut self, source: fn() -> MemoryUsage) -> Self {
        self.memory_source = source;
        self
    }

    pub fn store(&self) -> &TopologyStore {
        &self.store
    }

    pub fn interval(&self) -> Duration {
        self.sampler.interval()
    }

    pub fn on_connect(&mut self, client_id: &str, address: &str, bridge: Option<&str>) {
        log_failure(
            "connect",
            self.store.add_bridge_client(address, client_id, bridge),
        );
    }

    pub fn on_disconnect(&mut self, client_id: &str, address: &str) {
        log_failure("disconnect", self.store.remove_client(client_id, address));
    }

    /// System topics (`$`-prefixed) are not part of the graph.
    pub fn on_publish(
        &mut self,
        client_id: &str,
        address: &str,
        topic: &str,
        retain: bool,
        payload_len: usize,
    ) {
        if topic.starts_with('$') {
            debug!("Not tracking system topic {}", topic);
            return;
        }
        log_failure(
            "publish",
            self.store
                .add_publish(client_id, address, topic, retain, payload_len as u64),
        );
    }

    pub fn on_subscribe(&mut self, client_id: &str, address: &str, filter: &str) {
        log_failure(
            "subscribe",
            self.store.add_subscription(client_id, address, filter),
        );
    }

    pub fn on_unsubscribe(&mut self, client_id: &str, address: &str, filter: &str) {
        log_failure(
            "unsubscribe",
            self.store.remove_subscription(client_id, address, filter),
        );
    }

    pub fn on_latency_probe_start(&mut self, client_id: &str, address: &str, now: Instant) {
        log_failure(
            "latency probe",
            self.store.latency_probe_start(client_id, address, now),
        );
    }

    pub fn on_latency_probe_end(&mut self, client_id: &str, address: &str, now: Instant) {
        log_failure(
            "latency probe",
            self.store.latency_probe_end(client_id, address, now),
        );
    }

    /// Runs the sampler and renders whatever changed.
    pub fn on_tick(&mut self, now: Instant) -> GraphUpdate {
        let Some(report) = self.sampler.tick(now, &mut self.store) else {
            return GraphUpdate::default();
        };
        debug!(
            "Sampled graph: {} edges and {} topics expired",
            report.removed_edges, report.removed_topics
        );

        let graph = if self.store.take_changed() {
            to_json("graph snapshot", &Snapshot::render(&self.store))
        } else {
            None
        };
        let memory = self
            .memory
            .poll((self.memory_source)())
            .and_then(|usage| to_json("memory usage", &usage));

        GraphUpdate { graph, memory }
    }
}
