// SPDX-License-Identifier: MIT OR Apache-2.0
//! Click-to-connect gestures.
//!
//! A gesture starts on a source node or field and highlights two target
//! sets: targets a new edge may go to, and targets already connected (a
//! click on those removes the edge). The next click resolves the gesture;
//! a click anywhere else abandons it without touching the graph.

use crate::connection::ConnectionOutcome;
use crate::editor::{EditorError, GraphEditor};
use crate::field::FieldId;
use crate::node::NodeId;
use indexmap::IndexSet;

/// Where a gesture started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureSource {
    /// Node-level connection
    Node(NodeId),
    /// Field-level connection
    Field(FieldId),
}

/// Highlight state of an open gesture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourcing<E: std::hash::Hash + Eq> {
    /// Source endpoint
    pub source: E,
    /// Targets a new edge may go to
    pub eligible: IndexSet<E>,
    /// Targets already connected; clicking one removes the edge
    pub removable: IndexSet<E>,
}

impl<E: std::hash::Hash + Eq> Sourcing<E> {
    /// Whether a click on `target` resolves the gesture
    pub fn accepts(&self, target: &E) -> bool {
        self.eligible.contains(target) || self.removable.contains(target)
    }
}

/// Connection gesture state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionGesture {
    /// No gesture open
    #[default]
    Idle,
    /// Connecting from a node
    Node(Sourcing<NodeId>),
    /// Connecting from a field
    Field(Sourcing<FieldId>),
}

impl ConnectionGesture {
    /// Source of the open gesture
    pub fn source(&self) -> Option<GestureSource> {
        match self {
            Self::Idle => None,
            Self::Node(s) => Some(GestureSource::Node(s.source)),
            Self::Field(s) => Some(GestureSource::Field(s.source)),
        }
    }

    /// Whether no gesture is open
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl GraphEditor {
    /// Current gesture state
    pub fn gesture(&self) -> &ConnectionGesture {
        &self.gesture
    }

    /// Start connecting from a node
    pub fn begin_node_connection(&mut self, source: NodeId) -> Result<&Sourcing<NodeId>, EditorError> {
        if !self.gesture.is_idle() {
            return Err(EditorError::GestureInProgress);
        }
        let node = self.node(source).ok_or(EditorError::NodeNotFound(source))?;

        let mut sourcing = Sourcing {
            source,
            eligible: IndexSet::new(),
            removable: IndexSet::new(),
        };
        for target in self.nodes() {
            if node.is_connected_to(target.id) {
                sourcing.removable.insert(target.id);
            } else if node.can_connect_to(target.id, self)
                && self.check_node_connection(source, target.id).is_ok()
            {
                sourcing.eligible.insert(target.id);
            }
        }

        self.gesture = ConnectionGesture::Node(sourcing);
        self.notify();
        match &self.gesture {
            ConnectionGesture::Node(sourcing) => Ok(sourcing),
            _ => Err(EditorError::NodeNotFound(source)),
        }
    }

    /// Start connecting from a field
    pub fn begin_field_connection(&mut self, source: FieldId) -> Result<&Sourcing<FieldId>, EditorError> {
        if !self.gesture.is_idle() {
            return Err(EditorError::GestureInProgress);
        }
        let field = self.field(source).ok_or(EditorError::FieldNotFound(source))?;

        let mut sourcing = Sourcing {
            source,
            eligible: IndexSet::new(),
            removable: IndexSet::new(),
        };
        for target in self.fields() {
            if field.is_connected_to(target.id) {
                sourcing.removable.insert(target.id);
            } else if self.check_field_connection(source, target.id).is_ok() {
                sourcing.eligible.insert(target.id);
            }
        }

        self.gesture = ConnectionGesture::Field(sourcing);
        self.notify();
        match &self.gesture {
            ConnectionGesture::Field(sourcing) => Ok(sourcing),
            _ => Err(EditorError::FieldNotFound(source)),
        }
    }

    /// Click on a node. Resolves an open node gesture when the node is
    /// highlighted; any other open gesture is abandoned.
    pub fn click_node(&mut self, target: NodeId) -> Option<ConnectionOutcome> {
        match std::mem::take(&mut self.gesture) {
            ConnectionGesture::Node(sourcing) if sourcing.accepts(&target) => {
                Some(self.finish_node_connection(sourcing.source, target))
            }
            _ => {
                self.notify();
                None
            }
        }
    }

    /// Click on a field. Resolves an open field gesture when the field is
    /// highlighted; any other open gesture is abandoned.
    pub fn click_field(&mut self, target: FieldId) -> Option<ConnectionOutcome> {
        match std::mem::take(&mut self.gesture) {
            ConnectionGesture::Field(sourcing) if sourcing.accepts(&target) => {
                Some(self.finish_field_connection(sourcing.source, target))
            }
            _ => {
                self.notify();
                None
            }
        }
    }

    /// Click on empty canvas: abandon any open gesture
    pub fn click_empty(&mut self) {
        if !self.gesture.is_idle() {
            self.gesture = ConnectionGesture::Idle;
            self.notify();
        }
    }
}
