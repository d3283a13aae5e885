// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed value slots on nodes and global sections.
//!
//! A [`FieldSchema`] is the declaration carried by a node type; a [`Field`]
//! is the live slot materialized from it. Fields own their outgoing dataflow
//! connections and know how to compute the value they hand downstream.

use crate::connection::{ConnectionId, FieldConnection};
use crate::editor::GraphEditor;
use crate::expression::{ExpressionEngine, ExpressionError};
use crate::value::{ValidationError, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Unique identifier for a field, across nodes and globals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldId(pub Uuid);

impl FieldId {
    /// Create a new random field ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FieldId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn default_shown() -> bool {
    true
}

/// Field declaration on a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field name, unique within its owner
    pub name: String,
    /// Value kind
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Value new fields start with
    #[serde(default)]
    pub default: Value,
    /// Whether the field must be filled in
    #[serde(default)]
    pub required: bool,
    /// Whether the field is displayed on the node
    #[serde(default = "default_shown")]
    pub shown: bool,
}

impl FieldSchema {
    /// Create a schema with the zero value of its kind as default
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            default: value_type.zero_value(),
            required: false,
            shown: true,
        }
    }

    /// Set the default value, coerced to the field kind
    pub fn with_default(mut self, raw: Value) -> Result<Self, ValidationError> {
        self.default = self.value_type.coerce(&raw)?;
        Ok(self)
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Hide from the node body
    pub fn hidden(mut self) -> Self {
        self.shown = false;
        self
    }

    /// Re-coerce the default, used on schemas read from outside
    pub(crate) fn validated(mut self) -> Result<Self, ValidationError> {
        self.default = if self.default.is_null() {
            self.value_type.zero_value()
        } else {
            self.value_type.coerce(&self.default)?
        };
        Ok(self)
    }
}

/// Pending re-evaluation of a time-dependent function field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTimer {
    /// Time between evaluations
    pub interval: Duration,
    /// Next instant the field is due
    pub due: Instant,
}

impl RefreshTimer {
    /// Start a timer whose first tick is one interval after `now`
    pub fn starting_at(now: Instant, interval: Duration) -> Self {
        Self {
            interval,
            due: now + interval,
        }
    }

    /// Whether the timer has elapsed at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.due
    }

    /// Schedule the next tick one interval after `now`
    pub fn rearm(&mut self, now: Instant) {
        self.due = now + self.interval;
    }
}

/// A live value slot
#[derive(Debug, Clone)]
pub struct Field {
    /// Unique field ID
    pub id: FieldId,
    /// Field name
    pub name: String,
    /// Value kind
    pub value_type: ValueType,
    /// Whether the field must be filled in
    pub required: bool,
    /// Whether the field is displayed
    pub shown: bool,
    /// Schema default
    pub default_value: Value,
    value: Value,
    /// Last value received from upstream, used only by function fields
    input: Option<Value>,
    connections: IndexMap<FieldId, FieldConnection>,
    refresh: Option<RefreshTimer>,
}

impl Field {
    /// Materialize a fresh field from its schema
    pub fn from_schema(schema: &FieldSchema) -> Self {
        Self::with_id(FieldId::new(), schema)
    }

    /// Materialize a field with a known ID
    pub fn with_id(id: FieldId, schema: &FieldSchema) -> Self {
        Self {
            id,
            name: schema.name.clone(),
            value_type: schema.value_type,
            required: schema.required,
            shown: schema.shown,
            default_value: schema.default.clone(),
            value: schema.default.clone(),
            input: None,
            connections: IndexMap::new(),
            refresh: None,
        }
    }

    /// Schema this field was built from
    pub fn schema(&self) -> FieldSchema {
        FieldSchema {
            name: self.name.clone(),
            value_type: self.value_type,
            default: self.default_value.clone(),
            required: self.required,
            shown: self.shown,
        }
    }

    /// Whether the field matches a schema declaration
    pub fn matches_schema(&self, schema: &FieldSchema) -> bool {
        self.name == schema.name
            && self.value_type == schema.value_type
            && self.required == schema.required
            && self.shown == schema.shown
            && self.default_value == schema.default
    }

    /// Take over a (possibly changed) schema declaration, keeping identity,
    /// value and connections. A value that no longer fits the kind falls back
    /// to the schema default.
    pub(crate) fn adopt_schema(&mut self, schema: &FieldSchema) {
        if self.value_type != schema.value_type {
            self.value = schema
                .value_type
                .coerce(&self.value)
                .unwrap_or_else(|_| schema.default.clone());
            self.input = None;
            self.refresh = None;
        }
        self.name = schema.name.clone();
        self.value_type = schema.value_type;
        self.required = schema.required;
        self.shown = schema.shown;
        self.default_value = schema.default.clone();
    }

    /// Raw stored value. For function fields this is the expression text.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Coerce and store a new raw value
    pub fn set_value(&mut self, raw: &Value) -> Result<(), ValidationError> {
        self.value = self.value_type.coerce(raw)?;
        Ok(())
    }

    /// Value last received from upstream (function fields only)
    pub fn input(&self) -> Option<&Value> {
        self.input.as_ref()
    }

    pub(crate) fn clear_input(&mut self) {
        self.input = None;
    }

    /// Apply an upstream output. Function fields keep their expression and
    /// only take the output as their input; other kinds are overwritten.
    pub(crate) fn receive(&mut self, output: &Value) {
        if self.value_type == ValueType::Function {
            self.input = Some(output.clone());
            return;
        }
        match self.value_type.coerce(output) {
            Ok(value) => self.value = value,
            Err(e) => {
                tracing::warn!(field = %self.id, "Dropping incoming value: {e}");
            }
        }
    }

    /// Value handed to downstream fields
    pub fn compute_output_value(&self, engine: &dyn ExpressionEngine) -> Value {
        if self.value_type != ValueType::Function {
            return self.value.clone();
        }

        let expression = self.value.as_str().unwrap_or_default();
        let input = self.input.clone().unwrap_or(Value::Null);
        match engine.evaluate(expression, &input) {
            Ok(output) => output,
            Err(ExpressionError::Disabled) => {
                tracing::debug!(field = %self.id, "Expression evaluation disabled");
                self.value.clone()
            }
            Err(e) => {
                tracing::warn!(field = %self.id, name = %self.name, "Expression failed: {e}");
                self.value.clone()
            }
        }
    }

    /// Outgoing connections, in creation order
    pub fn connections(&self) -> impl Iterator<Item = &FieldConnection> {
        self.connections.values()
    }

    /// Whether this field feeds `target`
    pub fn is_connected_to(&self, target: FieldId) -> bool {
        self.connections.contains_key(&target)
    }

    /// Whether this field feeds anything
    pub fn has_outgoing(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Whether any field in the graph feeds this one
    pub fn has_incoming(&self, editor: &GraphEditor) -> bool {
        editor.has_incoming(self.id)
    }

    /// Add an edge to `target`. Returns `None` if one already exists.
    pub fn connect_to(&mut self, target: FieldId) -> Option<ConnectionId> {
        if self.connections.contains_key(&target) {
            return None;
        }
        let connection = FieldConnection::new(self.id, target);
        let id = connection.id;
        self.connections.insert(target, connection);
        Some(id)
    }

    /// Remove the edge to `target`
    pub fn disconnect(&mut self, target: FieldId) -> Option<FieldConnection> {
        self.connections.shift_remove(&target)
    }

    /// Insert a connection read from a snapshot, keeping its ID
    pub(crate) fn insert_connection(&mut self, connection: FieldConnection) {
        self.connections.insert(connection.to, connection);
    }

    /// Drop edges whose target fails `keep`, returning how many were dropped
    pub(crate) fn retain_connections(&mut self, mut keep: impl FnMut(FieldId) -> bool) -> usize {
        let before = self.connections.len();
        self.connections.retain(|target, _| keep(*target));
        before - self.connections.len()
    }

    /// Pending refresh timer
    pub fn refresh(&self) -> Option<&RefreshTimer> {
        self.refresh.as_ref()
    }

    /// Replace the refresh timer, handing back the one it cancels
    pub(crate) fn set_refresh(&mut self, timer: Option<RefreshTimer>) -> Option<RefreshTimer> {
        std::mem::replace(&mut self.refresh, timer)
    }

    pub(crate) fn refresh_mut(&mut self) -> Option<&mut RefreshTimer> {
        self.refresh.as_mut()
    }
}

/// Restore a field from persisted parts
pub(crate) fn restore_field(
    id: FieldId,
    schema: &FieldSchema,
    raw_value: &Value,
    connections: impl IntoIterator<Item = FieldConnection>,
) -> Result<Field, ValidationError> {
    let mut field = Field::with_id(id, schema);
    field.set_value(raw_value)?;
    for connection in connections {
        field.insert_connection(connection);
    }
    Ok(field)
}
