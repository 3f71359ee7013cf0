//! Topic nodes.
//!
//! A `Topic` exists while at least one client publishes to it, or while it is
//! draining after its last publisher went away. The lifecycle is an explicit
//! state machine:
//!
//! ```text
//!   Active ──last publisher gone──▶ Draining { ticks_left }
//!     ▲                                  │
//!     └────────new publisher─────────────┤
//!                                        ▼ ticks_left exhausted
//!                                      Gone (removed from the store)
//! ```
//!
//! Non-retained topics drain with `ticks_left == 0` and therefore vanish on
//! the next sampler tick; retained topics drain for the configured TTL.

use super::node::ClientKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicState {
    /// At least one live publish edge points here.
    Active,
    /// No publishers left. Removed by the tick that finds `ticks_left == 0`.
    Draining { ticks_left: u32 },
}

#[derive(Debug)]
pub struct Topic {
    pub name: String,
    pub retain: bool,
    /// Number of live publish edges referencing this topic.
    pub ref_cnt: usize,
    pub state: TopicState,
    /// Bytes received since the last sampler tick.
    pub bytes: u64,
    /// Incoming rate computed by the last sampler tick.
    pub bps: f64,
    /// Clients this topic is delivered to, in subscription order.
    pub subscribers: Vec<ClientKey>,
}

impl Topic {
    /// A topic starts without publishers, so it is draining until the first
    /// publish edge attaches.
    pub fn new(name: &str, retain: bool) -> Self {
        Self {
            name: name.to_string(),
            retain,
            ref_cnt: 0,
            state: TopicState::Draining { ticks_left: 0 },
            bytes: 0,
            bps: 0.0,
            subscribers: Vec::new(),
        }
    }

    /// Registers a new publish edge.
    pub fn attach_publisher(&mut self) {
        self.ref_cnt += 1;
        self.state = TopicState::Active;
    }

    /// Drops a publish edge; the last one starts the drain.
    pub fn detach_publisher(&mut self, ttl_budget: u32) {
        self.ref_cnt = self.ref_cnt.saturating_sub(1);
        if self.ref_cnt == 0 {
            let ticks_left = if self.retain { ttl_budget } else { 0 };
            self.state = TopicState::Draining { ticks_left };
        }
    }

    /// Advances the drain by one tick. Returns true when the topic is gone.
    pub fn drain_tick(&mut self) -> bool {
        match self.state {
            TopicState::Active => false,
            TopicState::Draining { ticks_left: 0 } => true,
            TopicState::Draining { ticks_left } => {
                self.state = TopicState::Draining {
                    ticks_left: ticks_left - 1,
                };
                false
            }
        }
    }

    pub fn has_subscriber(&self, key: &ClientKey) -> bool {
        self.subscribers.contains(key)
    }

    /// Adds a subscription edge. Returns false if it already existed.
    pub fn add_subscriber(&mut self, key: ClientKey) -> bool {
        if self.has_subscriber(&key) {
            return false;
        }
        self.subscribers.push(key);
        true
    }

    /// Removes a subscription edge. Returns false if there was none.
    pub fn remove_subscriber(&mut self, key: &ClientKey) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|k| k != key);
        self.subscribers.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::{Topic, TopicState};
    use crate::graph::node::ClientKey;

    #[test]
    fn non_retained_topic_drains_immediately() {
        let mut topic = Topic::new("a/b", false);
        topic.attach_publisher();
        topic.detach_publisher(3);

        assert_eq!(topic.state, TopicState::Draining { ticks_left: 0 });
        assert!(topic.drain_tick());
    }

    #[test]
    fn retained_topic_drains_for_budget() {
        let mut topic = Topic::new("a/b", true);
        topic.attach_publisher();
        topic.detach_publisher(2);

        assert!(!topic.drain_tick());
        assert!(!topic.drain_tick());
        assert!(topic.drain_tick());
    }

    #[test]
    fn new_publisher_reactivates() {
        let mut topic = Topic::new("a/b", true);
        topic.attach_publisher();
        topic.detach_publisher(2);
        topic.attach_publisher();

        assert_eq!(topic.state, TopicState::Active);
        assert_eq!(topic.ref_cnt, 1);
        assert!(!topic.drain_tick());
    }

    #[test]
    fn subscriber_edges_are_deduplicated() {
        let mut topic = Topic::new("a/b", false);
        let key = ClientKey::new("1.2.3.4", "c1");

        assert!(topic.add_subscriber(key.clone()));
        assert!(!topic.add_subscriber(key.clone()));
        assert_eq!(topic.subscribers.len(), 1);
        assert!(topic.remove_subscriber(&key));
        assert!(!topic.remove_subscriber(&key));
    }
}
