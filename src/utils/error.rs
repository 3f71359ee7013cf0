//! The `error` module defines the error type used by the topology store.
//!
//! Every public store operation returns `Result<_, GraphError>`; nothing in
//! the graph core panics or unwinds across its boundary. Callers on the
//! protocol side log these errors and carry on.

use std::collections::TryReserveError;

use thiserror::Error;

/// Which kind of graph entity a lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Ip,
    Client,
    Topic,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Ip => "ip",
            EntityKind::Client => "client",
            EntityKind::Topic => "topic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GraphError {
    /// The caller referred to an entity that was never added (or already
    /// removed). Points at an ordering problem in the protocol layer.
    #[error("{kind} not found: {key}")]
    NotFound { kind: EntityKind, key: String },

    /// Growing a dictionary failed. The dictionary keeps its previous state.
    #[error("allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("duplicate key: {0}")]
    Duplicate(String),
}

impl GraphError {
    pub fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        GraphError::NotFound {
            kind,
            key: key.into(),
        }
    }
}
