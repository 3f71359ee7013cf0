//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `netgraph` application.
//!
//! - `error`: the error type shared by the topology store and its hooks.
//! - `hash`: the identifier hash used as the key of every graph dictionary.
//! - `logging`: tracing subscriber setup.
//! - `memory`: heap usage accounting reported next to the graph document.

pub mod error;
pub mod hash;
pub mod logging;
pub mod memory;
