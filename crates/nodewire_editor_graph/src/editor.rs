// SPDX-License-Identifier: MIT OR Apache-2.0
//! The graph editor: owner of every node type, node and global section, and
//! home of the whole-graph algorithms (connection rules, cycle detection,
//! value propagation and consistency repair).
//!
//! Every public mutation runs to completion, including the consistency pass
//! and any propagation, before it returns. The editor is single-writer by
//! construction: it takes `&mut self` and holds no locks.

use crate::connection::{ConnectionOutcome, RejectReason};
use crate::expression::{is_time_dependent, DisabledEngine, ExpressionEngine};
use crate::field::{Field, FieldId, FieldSchema, RefreshTimer};
use crate::gesture::ConnectionGesture;
use crate::global::GlobalSection;
use crate::node::{EditorNode, NodeId, Position, TypeChange};
use crate::node_type::{NodeType, NodeTypeRegistry};
use crate::settings::EditorSettings;
use crate::value::{ValidationError, ValueType};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Graph metadata carried in snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphInfo {
    /// Identifier assigned by the graph store on first save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name
    pub name: String,
}

impl Default for GraphInfo {
    fn default() -> Self {
        Self {
            id: None,
            name: "Untitled".to_string(),
        }
    }
}

/// Where a field lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldOwner {
    /// Field of a node
    Node(NodeId),
    /// Field of a global section
    Global(String),
}

/// The top-level graph aggregate
pub struct GraphEditor {
    pub(crate) info: GraphInfo,
    pub(crate) settings: EditorSettings,
    pub(crate) types: NodeTypeRegistry,
    pub(crate) nodes: IndexMap<NodeId, EditorNode>,
    pub(crate) globals: IndexMap<String, GlobalSection>,
    pub(crate) field_index: HashMap<FieldId, FieldOwner>,
    pub(crate) selection: IndexSet<NodeId>,
    pub(crate) gesture: ConnectionGesture,
    expressions: Box<dyn ExpressionEngine>,
    on_change: Option<Box<dyn FnMut()>>,
}

impl GraphEditor {
    /// Create an empty graph
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            info: GraphInfo::default(),
            settings,
            types: NodeTypeRegistry::new(),
            nodes: IndexMap::new(),
            globals: IndexMap::new(),
            field_index: HashMap::new(),
            selection: IndexSet::new(),
            gesture: ConnectionGesture::Idle,
            expressions: Box::new(DisabledEngine),
            on_change: None,
        }
    }

    /// Install the engine used to evaluate function fields
    pub fn with_expression_engine(mut self, engine: impl ExpressionEngine + 'static) -> Self {
        self.set_expression_engine(engine);
        self
    }

    /// Replace the engine used to evaluate function fields
    pub fn set_expression_engine(&mut self, engine: impl ExpressionEngine + 'static) {
        self.expressions = Box::new(engine);
    }

    /// Register the callback invoked after every visible change
    pub fn set_on_change(&mut self, callback: impl FnMut() + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    /// Graph metadata
    pub fn info(&self) -> &GraphInfo {
        &self.info
    }

    /// Rename the graph
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.info.name = name.into();
        self.notify();
    }

    /// Set the store identifier of the graph
    pub fn set_graph_id(&mut self, id: Option<String>) {
        self.info.id = id;
    }

    /// Current settings
    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Replace the settings
    pub fn set_settings(&mut self, settings: EditorSettings) {
        self.settings = settings;
        self.commit();
    }

    /// Drop all content and start a new graph, keeping settings, engine and callback
    pub fn clear(&mut self, name: impl Into<String>) {
        self.info = GraphInfo {
            id: None,
            name: name.into(),
        };
        self.types = NodeTypeRegistry::new();
        self.nodes.clear();
        self.globals.clear();
        self.field_index.clear();
        self.selection.clear();
        self.gesture = ConnectionGesture::Idle;
        self.notify();
    }

    // ---------------------------------------------------------------------
    // Node types
    // ---------------------------------------------------------------------

    /// Get a node type by name
    pub fn node_type(&self, name: &str) -> Option<&NodeType> {
        self.types.get(name)
    }

    /// All node types, in registration order
    pub fn node_types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.types()
    }

    /// Add a node type, replacing any type with the same name. Existing
    /// nodes of that type are re-synced against the new definition.
    pub fn add_node_type(&mut self, node_type: NodeType) -> Option<NodeType> {
        let replaced = self.types.register(node_type);
        self.commit();
        replaced
    }

    /// Remove a node type together with every node of that type
    pub fn remove_node_type(&mut self, name: &str) -> Option<NodeType> {
        let removed = self.types.remove(name)?;
        let doomed: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.type_name == name)
            .map(|n| n.id)
            .collect();
        for id in doomed {
            self.detach_node(id);
        }
        self.commit();
        Some(removed)
    }

    /// Add or replace a field declaration on a node type
    pub fn add_type_field(&mut self, type_name: &str, schema: FieldSchema) -> Result<(), EditorError> {
        self.types
            .get_mut(type_name)
            .ok_or_else(|| EditorError::NodeTypeNotFound(type_name.to_string()))?
            .add_field(schema);
        self.commit();
        Ok(())
    }

    /// Remove a field declaration from a node type
    pub fn remove_type_field(
        &mut self,
        type_name: &str,
        field_name: &str,
    ) -> Result<Option<FieldSchema>, EditorError> {
        let removed = self
            .types
            .get_mut(type_name)
            .ok_or_else(|| EditorError::NodeTypeNotFound(type_name.to_string()))?
            .remove_field_by_name(field_name);
        self.commit();
        Ok(removed)
    }

    /// Set an option on a node type
    pub fn set_type_option(
        &mut self,
        type_name: &str,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), EditorError> {
        self.types
            .get_mut(type_name)
            .ok_or_else(|| EditorError::NodeTypeNotFound(type_name.to_string()))?
            .set_option(key, value);
        self.commit();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------------

    /// Place a new node of the named type
    pub fn add_node(&mut self, type_name: &str, position: Position) -> Result<NodeId, EditorError> {
        let node_type = self
            .types
            .get(type_name)
            .ok_or_else(|| EditorError::NodeTypeNotFound(type_name.to_string()))?;
        let node = EditorNode::new(node_type).with_position(position);
        let id = node.id;
        for field in node.fields() {
            self.field_index.insert(field.id, FieldOwner::Node(id));
        }
        self.nodes.insert(id, node);
        tracing::debug!(node = %id, node_type = type_name, "Added node");
        self.commit();
        Ok(id)
    }

    /// Remove a node. Connections into it and into its fields are pruned.
    pub fn remove_node(&mut self, id: NodeId) -> Option<EditorNode> {
        let node = self.detach_node(id)?;
        tracing::debug!(node = %id, "Removed node");
        self.commit();
        Some(node)
    }

    fn detach_node(&mut self, id: NodeId) -> Option<EditorNode> {
        let node = self.nodes.shift_remove(&id)?;
        for field in node.fields() {
            self.field_index.remove(&field.id);
        }
        self.selection.shift_remove(&id);
        Some(node)
    }

    /// Move a node on the canvas
    pub fn move_node(&mut self, id: NodeId, position: Position) -> Result<(), EditorError> {
        self.nodes
            .get_mut(&id)
            .ok_or(EditorError::NodeNotFound(id))?
            .position = position;
        self.notify();
        Ok(())
    }

    /// Switch a node to another type, merging fields by name
    pub fn set_node_type(&mut self, id: NodeId, type_name: &str) -> Result<(), EditorError> {
        let node_type = self
            .types
            .get(type_name)
            .ok_or_else(|| EditorError::NodeTypeNotFound(type_name.to_string()))?;
        let change = self
            .nodes
            .get_mut(&id)
            .ok_or(EditorError::NodeNotFound(id))?
            .set_type(node_type);
        self.apply_type_change(id, change);
        self.commit();
        Ok(())
    }

    fn apply_type_change(&mut self, node: NodeId, change: TypeChange) {
        for id in change.dropped {
            self.field_index.remove(&id);
        }
        for id in change.added {
            self.field_index.insert(id, FieldOwner::Node(node));
        }
    }

    /// Get a node by ID
    pub fn node(&self, id: NodeId) -> Option<&EditorNode> {
        self.nodes.get(&id)
    }

    /// All nodes, in creation order
    pub fn nodes(&self) -> impl Iterator<Item = &EditorNode> {
        self.nodes.values()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ---------------------------------------------------------------------
    // Globals
    // ---------------------------------------------------------------------

    /// Add an empty global section
    pub fn add_global(&mut self, name: impl Into<String>) -> Result<(), EditorError> {
        let name = name.into();
        if self.globals.contains_key(&name) {
            return Err(EditorError::DuplicateGlobal(name));
        }
        self.globals.insert(name.clone(), GlobalSection::new(name));
        self.notify();
        Ok(())
    }

    /// Remove a global section and prune connections into its fields
    pub fn remove_global(&mut self, name: &str) -> Option<GlobalSection> {
        let section = self.globals.shift_remove(name)?;
        for field in section.fields() {
            self.field_index.remove(&field.id);
        }
        self.commit();
        Some(section)
    }

    /// Add a field to a global section
    pub fn add_global_field(&mut self, section: &str, schema: FieldSchema) -> Result<FieldId, EditorError> {
        let id = self
            .globals
            .get_mut(section)
            .ok_or_else(|| EditorError::GlobalNotFound(section.to_string()))?
            .add_field(&schema);
        self.field_index
            .insert(id, FieldOwner::Global(section.to_string()));
        self.commit();
        Ok(id)
    }

    /// Remove a field from a global section
    pub fn remove_global_field(&mut self, section: &str, field: &str) -> Result<Option<Field>, EditorError> {
        let removed = self
            .globals
            .get_mut(section)
            .ok_or_else(|| EditorError::GlobalNotFound(section.to_string()))?
            .remove_field(field);
        if let Some(removed) = &removed {
            self.field_index.remove(&removed.id);
        }
        self.commit();
        Ok(removed)
    }

    /// Set a global field's value by name and propagate it
    pub fn set_global_value(&mut self, section: &str, field: &str, raw: Value) -> Result<(), EditorError> {
        let id = self
            .globals
            .get(section)
            .ok_or_else(|| EditorError::GlobalNotFound(section.to_string()))?
            .field(field)
            .map(|f| f.id)
            .ok_or_else(|| EditorError::FieldNameNotFound(field.to_string()))?;
        self.set_field_value(id, raw)
    }

    /// Get a global section by name
    pub fn global(&self, name: &str) -> Option<&GlobalSection> {
        self.globals.get(name)
    }

    /// All global sections, in creation order
    pub fn globals(&self) -> impl Iterator<Item = &GlobalSection> {
        self.globals.values()
    }

    // ---------------------------------------------------------------------
    // Fields
    // ---------------------------------------------------------------------

    /// Get a field by ID, searching node and global fields
    pub fn field(&self, id: FieldId) -> Option<&Field> {
        match self.field_index.get(&id)? {
            FieldOwner::Node(node) => self.nodes.get(node)?.field_by_id(id),
            FieldOwner::Global(section) => self.globals.get(section)?.field_by_id(id),
        }
    }

    pub(crate) fn field_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        match self.field_index.get(&id)? {
            FieldOwner::Node(node) => self.nodes.get_mut(node)?.field_by_id_mut(id),
            FieldOwner::Global(section) => self.globals.get_mut(section)?.field_by_id_mut(id),
        }
    }

    /// Owner of a field
    pub fn field_owner(&self, id: FieldId) -> Option<&FieldOwner> {
        self.field_index.get(&id)
    }

    /// Every field: node fields first, then global fields
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.nodes
            .values()
            .flat_map(|n| n.fields().iter())
            .chain(self.globals.values().flat_map(|g| g.fields().iter()))
    }

    fn fields_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.nodes
            .values_mut()
            .flat_map(|n| n.fields_mut().iter_mut())
            .chain(self.globals.values_mut().flat_map(|g| g.fields_mut().iter_mut()))
    }

    /// Whether any field feeds `id`
    pub fn has_incoming(&self, id: FieldId) -> bool {
        self.fields().any(|f| f.is_connected_to(id))
    }

    /// Value the field currently hands downstream
    pub fn field_output(&self, id: FieldId) -> Option<Value> {
        self.field(id)
            .map(|f| f.compute_output_value(self.expressions.as_ref()))
    }

    /// Coerce and store a field value, then push it downstream
    pub fn set_field_value(&mut self, id: FieldId, raw: Value) -> Result<(), EditorError> {
        let interval = self.settings.refresh_interval();
        let field = self.field_mut(id).ok_or(EditorError::FieldNotFound(id))?;
        field.set_value(&raw)?;
        if field.value_type == ValueType::Function {
            let clocked = field.value().as_str().is_some_and(is_time_dependent);
            let timer = clocked.then(|| RefreshTimer::starting_at(Instant::now(), interval));
            field.set_refresh(timer);
        }
        self.propagate(id);
        self.commit();
        Ok(())
    }

    /// Push a field's output through its outgoing connections, depth first.
    ///
    /// Edges to fields that no longer exist are removed on the way. Function
    /// targets keep their expression and take the output as their input;
    /// every other target has its value replaced. Termination relies on the
    /// field graph being acyclic, which the connection rules guarantee.
    pub fn propagate(&mut self, source: FieldId) {
        let mut stack = vec![source];
        while let Some(current) = stack.pop() {
            let Some(field) = self.field(current) else {
                continue;
            };
            let output = field.compute_output_value(self.expressions.as_ref());
            let targets: Vec<FieldId> = field.connections().map(|c| c.to).collect();

            let mut reached = Vec::with_capacity(targets.len());
            for target in targets {
                match self.field_mut(target) {
                    Some(field) => {
                        field.receive(&output);
                        reached.push(target);
                    }
                    None => {
                        if let Some(field) = self.field_mut(current) {
                            field.disconnect(target);
                        }
                        tracing::debug!(from = %current, to = %target, "Pruned dangling field connection");
                    }
                }
            }
            stack.extend(reached.into_iter().rev());
        }
    }

    // ---------------------------------------------------------------------
    // Connections
    // ---------------------------------------------------------------------

    /// Whether an edge `from -> to` would close a node loop
    pub fn would_recurse_nodes(&self, from: NodeId, to: NodeId) -> bool {
        from == to
            || reaches(to, from, |id| {
                self.nodes
                    .get(&id)
                    .map(|n| n.connections().map(|c| c.to).collect())
                    .unwrap_or_default()
            })
    }

    /// Whether an edge `from -> to` would close a field loop
    pub fn would_recurse_fields(&self, from: FieldId, to: FieldId) -> bool {
        from == to
            || reaches(to, from, |id| {
                self.field(id)
                    .map(|f| f.connections().map(|c| c.to).collect())
                    .unwrap_or_default()
            })
    }

    /// Check whether a new node edge `from -> to` is allowed
    pub fn check_node_connection(&self, from: NodeId, to: NodeId) -> Result<(), RejectReason> {
        let source = self.nodes.get(&from).ok_or(RejectReason::UnknownEndpoint)?;
        let target = self.nodes.get(&to).ok_or(RejectReason::UnknownEndpoint)?;
        if let Some(source_type) = self.types.get(&source.type_name) {
            if !source_type.allows_target(&target.type_name) {
                return Err(RejectReason::NotAllowed);
            }
        }
        if self.settings.prevent_circular_connections && self.would_recurse_nodes(from, to) {
            return Err(RejectReason::WouldCycle);
        }
        Ok(())
    }

    /// Check whether a new field edge `from -> to` is allowed
    pub fn check_field_connection(&self, from: FieldId, to: FieldId) -> Result<(), RejectReason> {
        let source = self.field(from).ok_or(RejectReason::UnknownEndpoint)?;
        let target = self.field(to).ok_or(RejectReason::UnknownEndpoint)?;
        if !source.value_type.is_compatible(target.value_type) {
            return Err(RejectReason::IncompatibleTypes);
        }
        if target.value_type != ValueType::Function && self.has_incoming(to) {
            return Err(RejectReason::TargetAlreadyDriven);
        }
        if self.would_recurse_fields(from, to) {
            return Err(RejectReason::WouldCycle);
        }
        Ok(())
    }

    /// Resolve a node connection gesture: remove an existing edge
    /// `from -> to`, otherwise add one if the rules allow it.
    pub fn finish_node_connection(&mut self, from: NodeId, to: NodeId) -> ConnectionOutcome {
        let Some(source) = self.nodes.get_mut(&from) else {
            return ConnectionOutcome::Rejected(RejectReason::UnknownEndpoint);
        };
        if let Some(removed) = source.disconnect(to) {
            tracing::debug!(%from, %to, "Removed node connection");
            self.commit();
            return ConnectionOutcome::Removed(removed.id);
        }

        if let Err(reason) = self.check_node_connection(from, to) {
            tracing::debug!(%from, %to, "Rejected node connection: {reason}");
            return ConnectionOutcome::Rejected(reason);
        }

        let Some(id) = self.nodes.get_mut(&from).and_then(|n| n.connect(to)) else {
            return ConnectionOutcome::Rejected(RejectReason::UnknownEndpoint);
        };
        tracing::debug!(%from, %to, "Added node connection");
        self.commit();
        ConnectionOutcome::Added(id)
    }

    /// Resolve a field connection gesture: remove an existing edge
    /// `from -> to`, otherwise add one if the rules allow it and push the
    /// source value through it.
    pub fn finish_field_connection(&mut self, from: FieldId, to: FieldId) -> ConnectionOutcome {
        let Some(source) = self.field_mut(from) else {
            return ConnectionOutcome::Rejected(RejectReason::UnknownEndpoint);
        };
        if let Some(removed) = source.disconnect(to) {
            if !self.has_incoming(to) {
                if let Some(target) = self.field_mut(to) {
                    target.clear_input();
                }
            }
            tracing::debug!(%from, %to, "Removed field connection");
            self.commit();
            return ConnectionOutcome::Removed(removed.id);
        }

        if let Err(reason) = self.check_field_connection(from, to) {
            tracing::debug!(%from, %to, "Rejected field connection: {reason}");
            return ConnectionOutcome::Rejected(reason);
        }

        let Some(id) = self.field_mut(from).and_then(|f| f.connect_to(to)) else {
            return ConnectionOutcome::Rejected(RejectReason::UnknownEndpoint);
        };
        tracing::debug!(%from, %to, "Added field connection");
        self.propagate(from);
        self.commit();
        ConnectionOutcome::Added(id)
    }

    // ---------------------------------------------------------------------
    // Consistency
    // ---------------------------------------------------------------------

    /// Repair the graph after a mutation:
    /// re-derive node fields from the current type definitions, drop node
    /// connections to missing nodes or disallowed types, drop field
    /// connections to missing fields, between incompatible types or beyond
    /// the first producer of a plain field, clear stale function inputs and
    /// forget selected nodes that are gone.
    pub fn ensure_consistency(&mut self) {
        let mut changes = Vec::new();
        for node in self.nodes.values_mut() {
            let Some(node_type) = self.types.get(&node.type_name) else {
                continue;
            };
            if !node.matches_type(node_type) {
                changes.push((node.id, node.set_type(node_type)));
            }
        }
        for (node, change) in changes {
            self.apply_type_change(node, change);
        }

        let live_nodes: HashMap<NodeId, String> = self
            .nodes
            .values()
            .map(|n| (n.id, n.type_name.clone()))
            .collect();
        let types = &self.types;
        let mut pruned_nodes = 0;
        for node in self.nodes.values_mut() {
            let source_type = types.get(&node.type_name);
            pruned_nodes += node.retain_connections(|target| {
                live_nodes.get(&target).is_some_and(|target_type| {
                    source_type.map_or(true, |t| t.allows_target(target_type))
                })
            });
        }

        // Types can change under existing edges. The first producer in
        // iteration order keeps a plain target.
        let field_types: HashMap<FieldId, ValueType> =
            self.fields().map(|f| (f.id, f.value_type)).collect();
        let mut pruned_fields = 0;
        let mut driven = HashSet::new();
        for field in self
            .nodes
            .values_mut()
            .flat_map(|n| n.fields_mut().iter_mut())
            .chain(self.globals.values_mut().flat_map(|g| g.fields_mut().iter_mut()))
        {
            let source_type = field.value_type;
            pruned_fields += field.retain_connections(|target| {
                field_types.get(&target).is_some_and(|&target_type| {
                    source_type.is_compatible(target_type)
                        && (target_type == ValueType::Function || !driven.contains(&target))
                })
            });
            driven.extend(field.connections().map(|c| c.to));
        }
        for field in self.fields_mut() {
            if field.input().is_some() && !driven.contains(&field.id) {
                field.clear_input();
            }
        }

        let nodes = &self.nodes;
        self.selection.retain(|id| nodes.contains_key(id));

        let gesture_live = match self.gesture.source() {
            None => true,
            Some(crate::gesture::GestureSource::Node(id)) => self.nodes.contains_key(&id),
            Some(crate::gesture::GestureSource::Field(id)) => self.field_index.contains_key(&id),
        };
        if !gesture_live {
            self.gesture = ConnectionGesture::Idle;
        }

        if pruned_nodes + pruned_fields > 0 {
            tracing::debug!(pruned_nodes, pruned_fields, "Pruned dangling connections");
        }
    }

    pub(crate) fn commit(&mut self) {
        self.ensure_consistency();
        self.notify();
    }

    pub(crate) fn notify(&mut self) {
        if let Some(callback) = self.on_change.as_mut() {
            callback();
        }
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    /// Selected node IDs, in selection order
    pub fn selection(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.selection.iter().copied()
    }

    /// Whether a node is selected
    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selection.contains(&id)
    }

    /// Add a node to the selection
    pub fn select(&mut self, id: NodeId) -> bool {
        if !self.nodes.contains_key(&id) || !self.selection.insert(id) {
            return false;
        }
        self.notify();
        true
    }

    /// Remove a node from the selection
    pub fn deselect(&mut self, id: NodeId) -> bool {
        if !self.selection.shift_remove(&id) {
            return false;
        }
        self.notify();
        true
    }

    /// Flip a node's selection, returning whether it is now selected
    pub fn toggle_selection(&mut self, id: NodeId) -> bool {
        if self.selection.contains(&id) {
            self.deselect(id);
            false
        } else {
            self.select(id)
        }
    }

    /// Replace the selection with the given nodes
    pub fn replace_selection(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        let nodes = &self.nodes;
        self.selection = ids.into_iter().filter(|id| nodes.contains_key(id)).collect();
        self.notify();
    }

    /// Clear the selection
    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.notify();
    }

    // ---------------------------------------------------------------------
    // Refresh timers
    // ---------------------------------------------------------------------

    /// Re-evaluate a field every `interval`, replacing any timer it had
    pub fn schedule_refresh(&mut self, id: FieldId, interval: Duration) -> Result<(), EditorError> {
        let field = self.field_mut(id).ok_or(EditorError::FieldNotFound(id))?;
        let timer = RefreshTimer::starting_at(Instant::now(), interval);
        if field.set_refresh(Some(timer)).is_some() {
            tracing::debug!(field = %id, "Replaced refresh timer");
        }
        Ok(())
    }

    /// Stop re-evaluating a field, returning whether it had a timer
    pub fn cancel_refresh(&mut self, id: FieldId) -> bool {
        self.field_mut(id)
            .and_then(|f| f.set_refresh(None))
            .is_some()
    }

    /// Fire every refresh timer due at `now`, returning how many fired
    pub fn tick(&mut self, now: Instant) -> usize {
        let due: Vec<FieldId> = self
            .fields()
            .filter(|f| f.refresh().is_some_and(|t| t.is_due(now)))
            .map(|f| f.id)
            .collect();

        for &id in &due {
            if let Some(timer) = self.field_mut(id).and_then(|f| f.refresh_mut()) {
                timer.rearm(now);
            }
            self.propagate(id);
        }
        if !due.is_empty() {
            self.commit();
        }
        due.len()
    }

    /// Engine used for function fields
    pub(crate) fn expressions(&self) -> &dyn ExpressionEngine {
        self.expressions.as_ref()
    }
}

impl Default for GraphEditor {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

impl fmt::Debug for GraphEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphEditor")
            .field("info", &self.info)
            .field("settings", &self.settings)
            .field("types", &self.types)
            .field("nodes", &self.nodes)
            .field("globals", &self.globals)
            .field("selection", &self.selection)
            .field("gesture", &self.gesture)
            .finish_non_exhaustive()
    }
}

/// Iterative reachability search from `start` to `goal`
fn reaches<I, F>(start: I, goal: I, mut successors: F) -> bool
where
    I: Copy + Eq + Hash,
    F: FnMut(I) -> Vec<I>,
{
    let mut stack = vec![start];
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == goal {
            return true;
        }
        if seen.insert(current) {
            stack.extend(successors(current));
        }
    }
    false
}

/// Error from an editor operation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Field not found
    #[error("Field not found: {0}")]
    FieldNotFound(FieldId),

    /// No field with that name in the section
    #[error("Field not found: {0}")]
    FieldNameNotFound(String),

    /// Node type not found
    #[error("Node type not found: {0}")]
    NodeTypeNotFound(String),

    /// Global section not found
    #[error("Global section not found: {0}")]
    GlobalNotFound(String),

    /// Global section name already taken
    #[error("Global section already exists: {0}")]
    DuplicateGlobal(String),

    /// A connection gesture is already open
    #[error("A connection gesture is already in progress")]
    GestureInProgress,

    /// Invalid value or definition
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
