// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end editing scenarios.

use nodewire_editor_graph::{
    ConnectionOutcome, FieldSchema, GraphEditor, GraphSnapshot, JsExpressionEngine, NodeId,
    NodeType, Position, RejectReason, ValueType,
};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("nodewire_editor_graph=debug")
        .with_test_writer()
        .try_init();
}

fn story() -> GraphEditor {
    let mut editor = GraphEditor::default();
    editor.add_node_type(
        NodeType::new("Choice")
            .with_field(FieldSchema::new("Message", ValueType::String))
            .with_allowed_targets(["Narrator"]),
    );
    editor.add_node_type(
        NodeType::new("Narrator").with_field(FieldSchema::new("Message", ValueType::String)),
    );
    editor
}

fn edge_set(editor: &GraphEditor) -> Vec<(NodeId, NodeId)> {
    editor
        .nodes()
        .flat_map(|n| n.connections().map(|c| (c.from, c.to)))
        .collect()
}

#[test]
fn choice_narrator_walkthrough() {
    init_tracing();
    let mut editor = story();
    let c1 = editor.add_node("Choice", Position::new(0.0, 0.0)).unwrap();
    let n1 = editor.add_node("Narrator", Position::new(200.0, 0.0)).unwrap();

    assert!(editor.finish_node_connection(c1, n1).is_added());
    assert_eq!(
        editor.finish_node_connection(n1, c1),
        ConnectionOutcome::Rejected(RejectReason::WouldCycle)
    );
    assert_eq!(edge_set(&editor), vec![(c1, n1)]);

    editor.remove_node(n1);
    assert_eq!(editor.node(c1).unwrap().connections().count(), 0);
}

#[test]
fn toggle_restores_edge_set() {
    let mut editor = story();
    let a = editor.add_node("Narrator", Position::default()).unwrap();
    let b = editor.add_node("Narrator", Position::default()).unwrap();
    let c = editor.add_node("Narrator", Position::default()).unwrap();
    editor.finish_node_connection(a, c);
    let before = edge_set(&editor);

    assert!(editor.finish_node_connection(a, b).is_added());
    assert!(editor.finish_node_connection(a, b).is_removed());
    assert_eq!(edge_set(&editor), before);
}

#[test]
fn retype_keeps_matching_fields() {
    let mut editor = GraphEditor::default();
    editor.add_node_type(NodeType::new("Small").with_field(FieldSchema::new("a", ValueType::Number)));
    editor.add_node_type(
        NodeType::new("Large")
            .with_field(FieldSchema::new("a", ValueType::Number))
            .with_field(
                FieldSchema::new("b", ValueType::Number)
                    .with_default(json!(9))
                    .unwrap(),
            ),
    );
    let node = editor.add_node("Small", Position::default()).unwrap();
    let sink = editor.add_node("Small", Position::default()).unwrap();
    let a = editor.node(node).unwrap().field("a").unwrap().id;
    let x = editor.node(sink).unwrap().field("a").unwrap().id;
    editor.set_field_value(a, json!(5)).unwrap();
    assert!(editor.finish_field_connection(a, x).is_added());
    let connections: Vec<_> = editor.field(a).unwrap().connections().cloned().collect();

    editor.set_node_type(node, "Large").unwrap();

    let retyped = editor.node(node).unwrap();
    let a_field = retyped.field("a").unwrap();
    assert_eq!(a_field.id, a);
    assert_eq!(a_field.value(), &json!(5));
    assert_eq!(a_field.connections().cloned().collect::<Vec<_>>(), connections);
    assert_eq!(retyped.field("b").unwrap().value(), &json!(9));
}

#[test]
fn string_values_flow_into_expressions() {
    let mut editor = GraphEditor::default().with_expression_engine(JsExpressionEngine::new());
    editor.add_node_type(
        NodeType::new("Source").with_field(FieldSchema::new("F", ValueType::String)),
    );
    editor.add_node_type(
        NodeType::new("Sink")
            .with_field(FieldSchema::new("G", ValueType::String))
            .with_field(FieldSchema::new("H", ValueType::Function)),
    );
    let source = editor.add_node("Source", Position::default()).unwrap();
    let sink = editor.add_node("Sink", Position::default()).unwrap();
    let f = editor.node(source).unwrap().field("F").unwrap().id;
    let g = editor.node(sink).unwrap().field("G").unwrap().id;
    let h = editor.node(sink).unwrap().field("H").unwrap().id;

    editor.set_field_value(h, json!("x + \"!\"")).unwrap();
    assert!(editor.finish_field_connection(f, g).is_added());
    assert!(editor.finish_field_connection(f, h).is_added());
    editor.set_field_value(f, json!("hello")).unwrap();

    assert_eq!(editor.field(g).unwrap().value(), &json!("hello"));
    assert_eq!(editor.field(h).unwrap().value(), &json!("x + \"!\""));
    assert_eq!(editor.field_output(h), Some(json!("hello!")));
}

#[test]
fn broken_expression_does_not_stop_siblings() {
    let mut editor = GraphEditor::default().with_expression_engine(JsExpressionEngine::new());
    editor.add_node_type(
        NodeType::new("T")
            .with_field(FieldSchema::new("fn", ValueType::Function))
            .with_field(FieldSchema::new("out", ValueType::String)),
    );
    let n = editor.add_node("T", Position::default()).unwrap();
    let m = editor.add_node("T", Position::default()).unwrap();
    let func = editor.node(n).unwrap().field("fn").unwrap().id;
    let out_n = editor.node(n).unwrap().field("out").unwrap().id;
    let out_m = editor.node(m).unwrap().field("out").unwrap().id;

    editor.finish_field_connection(func, out_n);
    editor.finish_field_connection(func, out_m);
    editor.set_field_value(func, json!("x.)(")).unwrap();

    // The raw expression text is handed on unchanged
    assert_eq!(editor.field(out_n).unwrap().value(), &json!("x.)("));
    assert_eq!(editor.field(out_m).unwrap().value(), &json!("x.)("));
}

#[test]
fn snapshot_round_trip_preserves_identity() {
    let mut editor = story();
    let c1 = editor.add_node("Choice", Position::new(10.0, 10.0)).unwrap();
    let n1 = editor.add_node("Narrator", Position::new(50.0, 10.0)).unwrap();
    editor.finish_node_connection(c1, n1);
    let from = editor.node(c1).unwrap().field("Message").unwrap().id;
    let to = editor.node(n1).unwrap().field("Message").unwrap().id;
    editor.finish_field_connection(from, to);
    editor.set_field_value(from, json!("Take the key")).unwrap();
    editor.select(n1);

    let text = editor.snapshot().to_json().unwrap();
    let mut restored = GraphEditor::default();
    restored.restore(GraphSnapshot::from_json(&text).unwrap()).unwrap();

    let ids = |e: &GraphEditor| e.nodes().map(|n| n.id).collect::<Vec<_>>();
    assert_eq!(ids(&restored), ids(&editor));
    assert_eq!(restored.field(to).unwrap().value(), &json!("Take the key"));
    assert!(restored.node(c1).unwrap().is_connected_to(n1));
    assert!(restored.field(from).unwrap().is_connected_to(to));
    assert_eq!(restored.node(n1).unwrap().type_name, "Narrator");
    assert_eq!(restored.selection().count(), 0);
    assert_eq!(restored.snapshot(), editor.snapshot());
}

#[test]
fn editing_a_type_after_restore_resyncs_nodes() {
    let mut editor = story();
    let n1 = editor.add_node("Narrator", Position::default()).unwrap();
    let mut snapshot = editor.snapshot();
    snapshot.node_types[1].add_field(FieldSchema::new("Mood", ValueType::String));

    editor.restore(snapshot).unwrap();
    let node = editor.node(n1).unwrap();
    assert_eq!(node.fields().len(), 2);
    assert!(node.field("Mood").is_some());
}
