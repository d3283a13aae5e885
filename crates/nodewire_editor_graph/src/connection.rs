// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::field::FieldId;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A directed edge between two endpoints of the same kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorConnection<E> {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Source endpoint
    pub from: E,
    /// Target endpoint
    pub to: E,
}

impl<E: Copy + PartialEq> EditorConnection<E> {
    /// Create a new connection
    pub fn new(from: E, to: E) -> Self {
        Self {
            id: ConnectionId::new(),
            from,
            to,
        }
    }
}

/// Structural edge between two nodes
pub type NodeConnection = EditorConnection<NodeId>;

/// Dataflow edge between two fields
pub type FieldConnection = EditorConnection<FieldId>;

/// Result of a connection gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// A new edge was created
    Added(ConnectionId),
    /// An existing edge between the endpoints was removed
    Removed(ConnectionId),
    /// Nothing changed
    Rejected(RejectReason),
}

impl ConnectionOutcome {
    /// Whether an edge was created
    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added(_))
    }

    /// Whether an edge was removed
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed(_))
    }

    /// Whether the graph was left untouched
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Why a connection was not created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// One of the endpoints does not exist
    UnknownEndpoint,
    /// The source node type does not list the target type in `canConnectTo`
    NotAllowed,
    /// The edge would close a loop
    WouldCycle,
    /// Field value types cannot feed each other
    IncompatibleTypes,
    /// The target field already has a producer
    TargetAlreadyDriven,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnknownEndpoint => "unknown endpoint",
            Self::NotAllowed => "target type not allowed",
            Self::WouldCycle => "would create a cycle",
            Self::IncompatibleTypes => "incompatible field types",
            Self::TargetAlreadyDriven => "target already has an incoming connection",
        };
        f.write_str(text)
    }
}
