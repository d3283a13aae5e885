// SPDX-License-Identifier: MIT OR Apache-2.0
//! Boundaries to the outside world: where graphs are stored and who is
//! signed in. The editor never sees transport details.

use crate::snapshot::GraphSnapshot;
use serde::{Deserialize, Serialize};

/// A graph as listed by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredGraph {
    /// Store identifier
    pub id: String,
    /// Snapshot as JSON text
    pub graph_json: String,
}

/// Persistence capability for the current user's graphs
pub trait GraphStore {
    /// List every graph owned by the current user
    fn list_own_graphs(&self) -> Result<Vec<StoredGraph>, StoreError>;

    /// Save a snapshot under its `graph_info.id`
    fn save(&mut self, snapshot: &GraphSnapshot) -> Result<(), StoreError>;

    /// Delete a stored graph
    fn delete(&mut self, id: &str) -> Result<(), StoreError>;
}

/// "Is anyone signed in?" signal
pub trait AuthSignal {
    /// Name of the signed-in user, if any
    fn current_user(&self) -> Option<String>;
}

/// Fixed auth signal, useful for offline hosts and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAuth(pub Option<String>);

impl StaticAuth {
    /// Signed in as `user`
    pub fn signed_in(user: impl Into<String>) -> Self {
        Self(Some(user.into()))
    }

    /// Nobody signed in
    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl AuthSignal for StaticAuth {
    fn current_user(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Failure reported by a graph store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
    /// Create an error from any message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
