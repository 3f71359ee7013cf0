//! The `graph` module tracks the live topology of the broker and renders it
//! as a JSON document.
//!
//! - `dict`: the resizable chained hash dictionary behind every lookup table.
//! - `filter`: MQTT-style topic filter matching.
//! - `node`, `topic`: the entities of the graph.
//! - `store`: the topology store and its lifecycle operations.
//! - `sampler`: when to sample rates and reap idle entities.
//! - `snapshot`: the rendered document.
//! - `monitor`: the hook surface used by the broker.

pub mod dict;
pub mod filter;
pub mod monitor;
pub mod node;
pub mod sampler;
pub mod snapshot;
pub mod store;
pub mod topic;

pub use monitor::{GraphMonitor, GraphUpdate};
pub use snapshot::Snapshot;
pub use store::{Mutation, SampleReport, TopologyStore};
