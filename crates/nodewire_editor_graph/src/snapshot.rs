// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted form of a graph.
//!
//! A snapshot holds node types, nodes, globals, settings and graph metadata.
//! Session-only state (selection, open gesture, refresh timers, function
//! inputs) is left out. Restoring keeps every ID and connection verbatim.

use crate::connection::{FieldConnection, NodeConnection};
use crate::editor::{FieldOwner, GraphEditor, GraphInfo};
use crate::expression::is_time_dependent;
use crate::field::{restore_field, Field, FieldId, FieldSchema, RefreshTimer};
use crate::global::GlobalSection;
use crate::gesture::ConnectionGesture;
use crate::node::{EditorNode, NodeId, Position};
use crate::node_type::{NodeType, NodeTypeRegistry};
use crate::settings::EditorSettings;
use crate::value::{ValidationError, ValueType};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Whole-graph snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    /// Graph metadata
    #[serde(default)]
    pub graph_info: GraphInfo,
    /// Node type definitions
    #[serde(default)]
    pub node_types: Vec<NodeType>,
    /// Placed nodes
    #[serde(default)]
    pub nodes: Vec<NodeSnapshot>,
    /// Global sections
    #[serde(default)]
    pub globals: Vec<GlobalSnapshot>,
    /// Editor settings
    #[serde(default)]
    pub settings: EditorSettings,
}

/// Reference to a node type by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    /// Type name
    pub name: String,
}

/// Persisted node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Node ID
    pub id: NodeId,
    /// Node type
    #[serde(rename = "type")]
    pub node_type: TypeRef,
    /// Canvas position
    #[serde(default)]
    pub position: Position,
    /// Fields
    #[serde(default)]
    pub fields: Vec<FieldSnapshot>,
    /// Outgoing node connections
    #[serde(default)]
    pub connections: Vec<NodeConnection>,
}

/// Persisted field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    /// Field ID
    pub id: FieldId,
    /// Field name
    pub name: String,
    /// Value kind
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Schema default
    #[serde(default)]
    pub default: Value,
    /// Whether the field must be filled in
    #[serde(default)]
    pub required: bool,
    /// Whether the field is displayed
    #[serde(default = "default_shown")]
    pub shown: bool,
    /// Raw value
    #[serde(default)]
    pub value: Value,
    /// Outgoing field connections
    #[serde(default)]
    pub connections: Vec<FieldConnection>,
}

fn default_shown() -> bool {
    true
}

/// Persisted global section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSnapshot {
    /// Section name
    pub name: String,
    /// Fields
    #[serde(default)]
    pub fields: Vec<FieldSnapshot>,
}

impl GraphSnapshot {
    /// Serialize to JSON text
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON text
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<&Field> for FieldSnapshot {
    fn from(field: &Field) -> Self {
        Self {
            id: field.id,
            name: field.name.clone(),
            value_type: field.value_type,
            default: field.default_value.clone(),
            required: field.required,
            shown: field.shown,
            value: field.value().clone(),
            connections: field.connections().cloned().collect(),
        }
    }
}

impl From<&EditorNode> for NodeSnapshot {
    fn from(node: &EditorNode) -> Self {
        Self {
            id: node.id,
            node_type: TypeRef {
                name: node.type_name.clone(),
            },
            position: node.position,
            fields: node.fields().iter().map(FieldSnapshot::from).collect(),
            connections: node.connections().cloned().collect(),
        }
    }
}

impl From<&GlobalSection> for GlobalSnapshot {
    fn from(section: &GlobalSection) -> Self {
        Self {
            name: section.name.clone(),
            fields: section.fields().iter().map(FieldSnapshot::from).collect(),
        }
    }
}

impl FieldSnapshot {
    fn into_field(self) -> Result<Field, ValidationError> {
        let schema = FieldSchema {
            name: self.name,
            value_type: self.value_type,
            default: self.default,
            required: self.required,
            shown: self.shown,
        }
        .validated()?;
        let raw = if self.value.is_null() {
            schema.default.clone()
        } else {
            self.value
        };
        restore_field(self.id, &schema, &raw, self.connections)
    }
}

/// Graph contents rebuilt from a snapshot, not yet installed
struct Rebuilt {
    types: NodeTypeRegistry,
    nodes: IndexMap<NodeId, EditorNode>,
    globals: IndexMap<String, GlobalSection>,
    field_index: HashMap<FieldId, FieldOwner>,
}

impl GraphEditor {
    /// Capture the persistent state of the graph
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            graph_info: self.info.clone(),
            node_types: self.types.types().cloned().collect(),
            nodes: self.nodes.values().map(NodeSnapshot::from).collect(),
            globals: self.globals.values().map(GlobalSnapshot::from).collect(),
            settings: self.settings.clone(),
        }
    }

    /// Replace the whole graph with a snapshot.
    ///
    /// The snapshot is validated first; on error the editor is left exactly
    /// as it was. Selection and any open gesture are cleared, function
    /// inputs are recomputed and clock-reading function fields get a fresh
    /// refresh timer.
    pub fn restore(&mut self, snapshot: GraphSnapshot) -> Result<(), ValidationError> {
        let rebuilt = rebuild(snapshot.node_types, snapshot.nodes, snapshot.globals)?;
        let order = field_order(&rebuilt)?;

        self.info = snapshot.graph_info;
        self.settings = snapshot.settings;
        self.types = rebuilt.types;
        self.nodes = rebuilt.nodes;
        self.globals = rebuilt.globals;
        self.field_index = rebuilt.field_index;
        self.selection = IndexSet::new();
        self.gesture = ConnectionGesture::Idle;

        self.rehydrate_inputs(&order);
        self.rearm_timers();
        tracing::debug!(
            nodes = self.nodes.len(),
            globals = self.globals.len(),
            "Restored graph snapshot"
        );
        self.commit();
        Ok(())
    }

    /// Hand each function field the output of its producers, producers first
    fn rehydrate_inputs(&mut self, order: &[FieldId]) {
        for &id in order {
            let Some(field) = self.field(id) else {
                continue;
            };
            let targets: Vec<FieldId> = field
                .connections()
                .map(|c| c.to)
                .filter(|to| {
                    self.field(*to)
                        .is_some_and(|t| t.value_type == ValueType::Function)
                })
                .collect();
            if targets.is_empty() {
                continue;
            }
            let output = field.compute_output_value(self.expressions());
            for target in targets {
                if let Some(target) = self.field_mut(target) {
                    target.receive(&output);
                }
            }
        }
    }

    fn rearm_timers(&mut self) {
        let interval = self.settings.refresh_interval();
        let clocked: Vec<FieldId> = self
            .fields()
            .filter(|f| {
                f.value_type == ValueType::Function
                    && f.value().as_str().is_some_and(is_time_dependent)
            })
            .map(|f| f.id)
            .collect();
        let now = Instant::now();
        for id in clocked {
            if let Some(field) = self.field_mut(id) {
                field.set_refresh(Some(RefreshTimer::starting_at(now, interval)));
            }
        }
    }
}

fn rebuild(
    node_types: Vec<NodeType>,
    nodes: Vec<NodeSnapshot>,
    globals: Vec<GlobalSnapshot>,
) -> Result<Rebuilt, ValidationError> {
    let mut types = NodeTypeRegistry::new();
    for node_type in node_types {
        types.register(node_type.validated()?);
    }

    let mut field_index = HashMap::new();
    let mut index_field = |id: FieldId, owner: FieldOwner| {
        if field_index.insert(id, owner).is_some() {
            Err(ValidationError::DuplicateFieldId(id))
        } else {
            Ok(())
        }
    };

    let mut rebuilt_nodes = IndexMap::new();
    for node in nodes {
        if !types.contains(&node.node_type.name) {
            return Err(ValidationError::UnknownNodeType(node.node_type.name));
        }
        let fields = node
            .fields
            .into_iter()
            .map(FieldSnapshot::into_field)
            .collect::<Result<Vec<_>, _>>()?;
        for field in &fields {
            index_field(field.id, FieldOwner::Node(node.id))?;
        }
        let restored = EditorNode::from_parts(
            node.id,
            node.node_type.name,
            node.position,
            fields,
            node.connections,
        );
        if rebuilt_nodes.insert(node.id, restored).is_some() {
            return Err(ValidationError::DuplicateNodeId(node.id));
        }
    }

    let mut rebuilt_globals = IndexMap::new();
    for section in globals {
        let fields = section
            .fields
            .into_iter()
            .map(FieldSnapshot::into_field)
            .collect::<Result<Vec<_>, _>>()?;
        for field in &fields {
            index_field(field.id, FieldOwner::Global(section.name.clone()))?;
        }
        rebuilt_globals.insert(
            section.name.clone(),
            GlobalSection::from_parts(section.name, fields),
        );
    }

    Ok(Rebuilt {
        types,
        nodes: rebuilt_nodes,
        globals: rebuilt_globals,
        field_index,
    })
}

/// Topological order of fields along their connections. Fails if the field
/// connections contain a loop, since propagation would never end.
fn field_order(rebuilt: &Rebuilt) -> Result<Vec<FieldId>, ValidationError> {
    let fields: Vec<&Field> = rebuilt
        .nodes
        .values()
        .flat_map(|n| n.fields().iter())
        .chain(rebuilt.globals.values().flat_map(|g| g.fields().iter()))
        .collect();

    let mut in_degree: HashMap<FieldId, usize> = fields.iter().map(|f| (f.id, 0)).collect();
    for field in &fields {
        for connection in field.connections() {
            if let Some(degree) = in_degree.get_mut(&connection.to) {
                *degree += 1;
            }
        }
    }

    let by_id: HashMap<FieldId, &Field> = fields.iter().map(|f| (f.id, *f)).collect();
    let mut ready: VecDeque<FieldId> = fields
        .iter()
        .filter(|f| in_degree.get(&f.id) == Some(&0))
        .map(|f| f.id)
        .collect();
    let mut order = Vec::with_capacity(fields.len());

    while let Some(id) = ready.pop_front() {
        order.push(id);
        let Some(field) = by_id.get(&id) else {
            continue;
        };
        for connection in field.connections() {
            if let Some(degree) = in_degree.get_mut(&connection.to) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(connection.to);
                }
            }
        }
    }

    if order.len() == fields.len() {
        Ok(order)
    } else {
        Err(ValidationError::CyclicFieldConnections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> GraphEditor {
        let mut editor = GraphEditor::default();
        editor.set_name("Story");
        editor.add_node_type(
            NodeType::new("Choice")
                .with_field(FieldSchema::new("Message", ValueType::String))
                .with_allowed_targets(["Narrator"]),
        );
        editor.add_node_type(
            NodeType::new("Narrator")
                .with_field(FieldSchema::new("Message", ValueType::String))
                .with_field(FieldSchema::new("Tags", ValueType::Array)),
        );
        let c = editor.add_node("Choice", Position::new(1.0, 2.0)).unwrap();
        let n = editor.add_node("Narrator", Position::new(3.0, 4.0)).unwrap();
        editor.finish_node_connection(c, n);
        let from = editor.node(c).unwrap().field("Message").unwrap().id;
        let to = editor.node(n).unwrap().field("Message").unwrap().id;
        editor.finish_field_connection(from, to);
        editor.set_field_value(from, json!("Go left")).unwrap();
        editor.add_global("World").unwrap();
        editor
            .add_global_field("World", FieldSchema::new("Gold", ValueType::Number))
            .unwrap();
        editor.set_global_value("World", "Gold", json!(12)).unwrap();
        editor.select(c);
        editor
    }

    #[test]
    fn test_snapshot_shape() {
        let editor = sample();
        let json = serde_json::to_value(editor.snapshot()).unwrap();

        assert_eq!(json["graphInfo"]["name"], json!("Story"));
        assert_eq!(json["nodeTypes"][0]["name"], json!("Choice"));
        assert_eq!(json["nodeTypes"][0]["options"]["canConnectTo"], json!(["Narrator"]));
        assert_eq!(json["nodeTypes"][1]["fields"][1]["type"], json!("array"));
        assert_eq!(json["nodes"][0]["type"]["name"], json!("Choice"));
        assert_eq!(json["nodes"][0]["position"], json!({"x": 1.0, "y": 2.0}));
        assert_eq!(json["nodes"][0]["fields"][0]["value"], json!("Go left"));
        assert_eq!(json["nodes"][1]["fields"][0]["value"], json!("Go left"));
        assert!(json["nodes"][0]["connections"][0]["from"].is_string());
        assert_eq!(json["globals"][0]["fields"][0]["value"], json!(12));
        assert_eq!(json["settings"]["preventCircularConnections"], json!(true));
        assert!(json.get("selection").is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let editor = sample();
        let snapshot = editor.snapshot();
        let text = snapshot.to_json().unwrap();

        let mut restored = GraphEditor::default();
        restored.restore(GraphSnapshot::from_json(&text).unwrap()).unwrap();

        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.selection().count(), 0);
    }

    #[test]
    fn test_unknown_type_leaves_editor_untouched() {
        let mut snapshot = sample().snapshot();
        snapshot.nodes[0].node_type.name = "Missing".into();

        let mut editor = sample();
        let before = editor.snapshot();
        assert_eq!(
            editor.restore(snapshot),
            Err(ValidationError::UnknownNodeType("Missing".into()))
        );
        assert_eq!(editor.snapshot(), before);
    }

    #[test]
    fn test_duplicate_field_ids_rejected() {
        let mut snapshot = sample().snapshot();
        let duplicate = snapshot.nodes[0].fields[0].id;
        snapshot.globals[0].fields[0].id = duplicate;

        let mut editor = GraphEditor::default();
        assert_eq!(
            editor.restore(snapshot),
            Err(ValidationError::DuplicateFieldId(duplicate))
        );
    }

    #[test]
    fn test_cyclic_field_connections_rejected() {
        let mut snapshot = sample().snapshot();
        let back = FieldConnection::new(
            snapshot.nodes[1].fields[0].id,
            snapshot.nodes[0].fields[0].id,
        );
        snapshot.nodes[1].fields[0].connections.push(back);

        let mut editor = GraphEditor::default();
        assert_eq!(
            editor.restore(snapshot),
            Err(ValidationError::CyclicFieldConnections)
        );
    }

    #[test]
    fn test_unknown_value_type_rejected_on_parse() {
        let text = sample().snapshot().to_json().unwrap();
        let text = text.replacen("\"array\"", "\"tuple\"", 1);
        assert!(GraphSnapshot::from_json(&text).is_err());
    }

    #[test]
    fn test_malformed_value_rejected() {
        let mut snapshot = sample().snapshot();
        snapshot.nodes[1].fields[1].value = json!("[1, 2");

        let mut editor = GraphEditor::default();
        assert!(matches!(
            editor.restore(snapshot),
            Err(ValidationError::MalformedLiteral { .. })
        ));
    }

    #[test]
    fn test_function_inputs_rebuilt() {
        let mut editor = GraphEditor::default().with_expression_engine(
            |_: &str, input: &Value| -> Result<Value, crate::ExpressionError> { Ok(input.clone()) },
        );
        editor.add_node_type(
            NodeType::new("T")
                .with_field(FieldSchema::new("text", ValueType::String))
                .with_field(FieldSchema::new("fn", ValueType::Function)),
        );
        let n = editor.add_node("T", Position::default()).unwrap();
        let text = editor.node(n).unwrap().field("text").unwrap().id;
        let func = editor.node(n).unwrap().field("fn").unwrap().id;
        editor.finish_field_connection(text, func);
        editor.set_field_value(text, json!("carried")).unwrap();

        let snapshot = editor.snapshot();
        editor.clear("Empty");
        assert!(editor.field(func).is_none());

        editor.restore(snapshot).unwrap();
        assert_eq!(editor.field(func).unwrap().input(), Some(&json!("carried")));
        assert_eq!(editor.field_output(func), Some(json!("carried")));
    }

    #[test]
    fn test_restore_prunes_edges_that_break_field_rules() {
        let mut snapshot = sample().snapshot();
        snapshot.node_types[1].add_field(FieldSchema::new("Message", ValueType::Number));
        let from = snapshot.nodes[0].fields[0].id;
        let to = snapshot.nodes[1].fields[0].id;

        let mut editor = GraphEditor::default();
        editor.restore(snapshot).unwrap();
        assert_eq!(editor.field(to).unwrap().value_type, ValueType::Number);
        assert!(!editor.field(from).unwrap().is_connected_to(to));
    }

    #[test]
    fn test_restore_keeps_first_producer_of_plain_field() {
        let mut editor = GraphEditor::default();
        editor.add_node_type(NodeType::new("P").with_field(FieldSchema::new("p", ValueType::String)));
        let nodes: Vec<NodeId> = (0..3)
            .map(|_| editor.add_node("P", Position::default()).unwrap())
            .collect();
        let ids: Vec<FieldId> = nodes
            .iter()
            .map(|&n| editor.node(n).unwrap().fields()[0].id)
            .collect();
        assert!(editor.finish_field_connection(ids[0], ids[2]).is_added());

        let mut snapshot = editor.snapshot();
        snapshot.nodes[1].fields[0]
            .connections
            .push(crate::connection::EditorConnection::new(ids[1], ids[2]));

        editor.restore(snapshot).unwrap();
        assert!(editor.field(ids[0]).unwrap().is_connected_to(ids[2]));
        assert!(!editor.field(ids[1]).unwrap().is_connected_to(ids[2]));
    }
}
