//! The `broker` module routes messages between connected clients and feeds
//! every connection, subscription and publish into the topology graph.

pub mod engine;
pub mod message;

pub use engine::{Broker, SharedBroker, lock};

#[cfg(test)]
mod tests;
