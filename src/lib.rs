//! # netgraph
//!
//! `netgraph` is an in-memory publish/subscribe broker that keeps a live
//! topology graph of its own traffic: which IP addresses host which clients,
//! which clients publish to which topics, and who subscribes to them.
//!
//! ## Core Modules
//!
//! - `graph`: The topology store, its sampler and the JSON snapshot renderer.
//! - `broker`: Routes messages between clients and feeds the graph monitor.
//! - `client`: Represents a connected WebSocket client.
//! - `config`: Loads server, graph and logging settings.
//! - `transport`: The WebSocket server and the client/server wire messages.
//! - `utils`: Errors, hashing, logging setup and allocation accounting.

pub mod broker;
pub mod client;
pub mod config;
pub mod graph;
pub mod transport;
pub mod utils;
