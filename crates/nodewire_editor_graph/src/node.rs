// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node instances placed in the editor.

use crate::connection::{ConnectionId, NodeConnection};
use crate::editor::GraphEditor;
use crate::field::{Field, FieldId};
use crate::node_type::NodeType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Position on the editor canvas
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Position {
    /// Create a position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Field IDs a retype added and dropped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeChange {
    /// Fields created from schema defaults
    pub added: Vec<FieldId>,
    /// Fields whose schema no longer exists
    pub dropped: Vec<FieldId>,
}

/// A placed instance of a node type
#[derive(Debug, Clone)]
pub struct EditorNode {
    /// Unique instance ID
    pub id: NodeId,
    /// Name of the node type
    pub type_name: String,
    /// Position in the graph UI
    pub position: Position,
    fields: Vec<Field>,
    connections: IndexMap<NodeId, NodeConnection>,
}

impl EditorNode {
    /// Create a new node from a type definition
    pub fn new(node_type: &NodeType) -> Self {
        Self {
            id: NodeId::new(),
            type_name: node_type.name.clone(),
            position: Position::default(),
            fields: node_type.fields.iter().map(Field::from_schema).collect(),
            connections: IndexMap::new(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Reassemble a node from persisted parts
    pub(crate) fn from_parts(
        id: NodeId,
        type_name: String,
        position: Position,
        fields: Vec<Field>,
        connections: impl IntoIterator<Item = NodeConnection>,
    ) -> Self {
        Self {
            id,
            type_name,
            position,
            fields,
            connections: connections.into_iter().map(|c| (c.to, c)).collect(),
        }
    }

    /// Fields, in schema order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    /// Get a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get a field by ID
    pub fn field_by_id(&self, id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub(crate) fn field_by_id_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == id)
    }

    /// Whether the field list matches the type's declarations exactly
    pub fn matches_type(&self, node_type: &NodeType) -> bool {
        self.type_name == node_type.name
            && self.fields.len() == node_type.fields.len()
            && self
                .fields
                .iter()
                .zip(&node_type.fields)
                .all(|(field, schema)| field.matches_schema(schema))
    }

    /// Switch to `node_type`. Fields whose name survives keep their ID,
    /// value and connections; new declarations start from their default;
    /// fields without a declaration are dropped. Edges pointing at dropped
    /// fields from elsewhere are left for the editor's consistency pass.
    pub fn set_type(&mut self, node_type: &NodeType) -> TypeChange {
        let mut previous: IndexMap<String, Field> = self
            .fields
            .drain(..)
            .map(|f| (f.name.clone(), f))
            .collect();
        let mut change = TypeChange::default();

        self.fields = node_type
            .fields
            .iter()
            .map(|schema| match previous.shift_remove(&schema.name) {
                Some(mut field) => {
                    field.adopt_schema(schema);
                    field
                }
                None => {
                    let field = Field::from_schema(schema);
                    change.added.push(field.id);
                    field
                }
            })
            .collect();

        change.dropped = previous.values().map(|f| f.id).collect();
        self.type_name = node_type.name.clone();
        change
    }

    /// Outgoing node connections, in creation order
    pub fn connections(&self) -> impl Iterator<Item = &NodeConnection> {
        self.connections.values()
    }

    /// Whether this node connects to `target`
    pub fn is_connected_to(&self, target: NodeId) -> bool {
        self.connections.contains_key(&target)
    }

    /// Add an edge to `target`. Returns `None` if one already exists.
    pub fn connect(&mut self, target: NodeId) -> Option<ConnectionId> {
        if self.connections.contains_key(&target) {
            return None;
        }
        let connection = NodeConnection::new(self.id, target);
        let id = connection.id;
        self.connections.insert(target, connection);
        Some(id)
    }

    /// Remove the edge to `target`
    pub fn disconnect(&mut self, target: NodeId) -> Option<NodeConnection> {
        self.connections.shift_remove(&target)
    }

    /// Drop edges whose target fails `keep`, returning how many were dropped
    pub(crate) fn retain_connections(&mut self, mut keep: impl FnMut(NodeId) -> bool) -> usize {
        let before = self.connections.len();
        self.connections.retain(|target, _| keep(*target));
        before - self.connections.len()
    }

    /// Whether a new edge to `target` is allowed: no edge to it exists yet
    /// and this node's type lists the target's type (when it restricts).
    pub fn can_connect_to(&self, target: NodeId, editor: &GraphEditor) -> bool {
        if self.is_connected_to(target) {
            return false;
        }
        let Some(target_node) = editor.node(target) else {
            return false;
        };
        editor
            .node_type(&self.type_name)
            .map_or(true, |t| t.allows_target(&target_node.type_name))
    }
}
