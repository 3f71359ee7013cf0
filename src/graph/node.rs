//! Address and client nodes, and the publish edges clients own.
//!
//! Nothing here holds a pointer to anything else: a client names its
//! container by address, a publish edge names its topic, and a subscription
//! edge names its client through a `ClientKey`. The store resolves those
//! keys through its dictionaries.

use std::time::Instant;

use super::dict::HashDict;

/// Rates and latencies closer than this are treated as equal.
pub const EPSILON: f64 = 0.001;

/// Identifies a client across the store: its address plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    pub address: String,
    pub client_id: String,
}

impl ClientKey {
    pub fn new(address: &str, client_id: &str) -> Self {
        Self {
            address: address.to_string(),
            client_id: client_id.to_string(),
        }
    }
}

/// One distinct client network address and the clients connected from it.
#[derive(Debug)]
pub struct IpContainer {
    pub address: String,
    pub clients: HashDict<Client>,
}

impl IpContainer {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            clients: HashDict::new(),
        }
    }
}

/// "This client publishes to this topic."
#[derive(Debug)]
pub struct PubEdge {
    pub topic: String,
    /// Bytes sent since the last sampler tick.
    pub bytes: u64,
    pub bps: f64,
    /// Remaining idle ticks before the edge is dropped.
    pub ttl: i64,
}

impl PubEdge {
    pub fn new(topic: &str, ttl: i64) -> Self {
        Self {
            topic: topic.to_string(),
            bytes: 0,
            bps: 0.0,
            ttl,
        }
    }
}

/// Round-trip measurement between a latency probe and its acknowledgement.
#[derive(Debug, Default)]
pub struct Latency {
    pending: Option<Instant>,
    sum_ms: f64,
    samples: u32,
    average: Option<f64>,
}

impl Latency {
    pub fn start(&mut self, now: Instant) {
        self.pending = Some(now);
    }

    /// Completes the pending probe. Returns the sample in milliseconds, or
    /// `None` if no probe was in flight.
    pub fn end(&mut self, now: Instant) -> Option<f64> {
        let started = self.pending.take()?;
        let ms = now.saturating_duration_since(started).as_secs_f64() * 1000.0;
        self.sum_ms += ms;
        self.samples += 1;
        Some(ms)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Average reported by the last tick, `None` until a probe completed.
    pub fn average(&self) -> Option<f64> {
        self.average
    }

    /// Folds the samples collected since the last tick into the reported
    /// average. Returns true if the reported value changed.
    pub fn fold(&mut self) -> bool {
        if self.samples == 0 {
            return false;
        }
        let next = self.sum_ms / f64::from(self.samples);
        self.sum_ms = 0.0;
        self.samples = 0;

        let changed = self.average.is_none_or(|prev| (prev - next).abs() > EPSILON);
        self.average = Some(next);
        changed
    }
}

/// One connected session.
#[derive(Debug)]
pub struct Client {
    pub id: String,
    /// Key of the owning `IpContainer`.
    pub address: String,
    /// Remote broker address when this session is a bridge.
    pub bridge: Option<String>,
    /// Subscription filters, so topics created later can be matched.
    pub filters: Vec<String>,
    pub published: HashDict<PubEdge>,
    pub latency: Latency,
}

impl Client {
    pub fn new(address: &str, id: &str, bridge: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            address: address.to_string(),
            bridge: bridge.map(str::to_string),
            filters: Vec::new(),
            published: HashDict::new(),
            latency: Latency::default(),
        }
    }

    pub fn key(&self) -> ClientKey {
        ClientKey::new(&self.address, &self.id)
    }

    /// True if any remembered filter matches `topic`.
    pub fn subscribes_to(&self, topic: &str) -> bool {
        self.filters
            .iter()
            .any(|f| super::filter::topic_matches(f, topic))
    }
}
