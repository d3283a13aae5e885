// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node type schemas and their registry.

use crate::field::FieldSchema;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Option key holding the allow-list of target node type names
pub const CAN_CONNECT_TO: &str = "canConnectTo";

/// Named schema: ordered field declarations plus connection options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeType {
    /// Unique type name
    pub name: String,
    /// Field declarations, in display order
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    /// Free-form options, e.g. `canConnectTo`
    #[serde(default)]
    pub options: IndexMap<String, Value>,
}

impl NodeType {
    /// Create a type with no fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            options: IndexMap::new(),
        }
    }

    /// Add a field declaration
    pub fn with_field(mut self, schema: FieldSchema) -> Self {
        self.add_field(schema);
        self
    }

    /// Restrict which node types this type may connect to
    pub fn with_allowed_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = targets
            .into_iter()
            .map(|t| Value::String(t.into()))
            .collect();
        self.set_option(CAN_CONNECT_TO, Value::Array(names));
        self
    }

    /// Add a field declaration, replacing one with the same name in place
    pub fn add_field(&mut self, schema: FieldSchema) {
        match self.fields.iter_mut().find(|f| f.name == schema.name) {
            Some(existing) => *existing = schema,
            None => self.fields.push(schema),
        }
    }

    /// Remove a field declaration
    pub fn remove_field_by_name(&mut self, name: &str) -> Option<FieldSchema> {
        let index = self.fields.iter().position(|f| f.name == name)?;
        Some(self.fields.remove(index))
    }

    /// Get a field declaration by name
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get an option
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Set an option
    pub fn set_option(&mut self, key: impl Into<String>, value: Value) {
        self.options.insert(key.into(), value);
    }

    /// Allowed target type names, if the type restricts them
    pub fn allowed_targets(&self) -> Option<Vec<&str>> {
        let list = self.option(CAN_CONNECT_TO)?.as_array()?;
        Some(list.iter().filter_map(Value::as_str).collect())
    }

    /// Whether a node of this type may connect to a node of `target_type`
    pub fn allows_target(&self, target_type: &str) -> bool {
        self.allowed_targets()
            .map_or(true, |allowed| allowed.contains(&target_type))
    }

    /// Check that every default fits its declared kind
    pub(crate) fn validated(mut self) -> Result<Self, crate::value::ValidationError> {
        self.fields = self
            .fields
            .into_iter()
            .map(FieldSchema::validated)
            .collect::<Result<_, _>>()?;
        Ok(self)
    }
}

/// Registry of node types by name
#[derive(Debug, Clone, Default)]
pub struct NodeTypeRegistry {
    types: IndexMap<String, NodeType>,
}

impl NodeTypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type, returning the one it replaces
    pub fn register(&mut self, node_type: NodeType) -> Option<NodeType> {
        self.types.insert(node_type.name.clone(), node_type)
    }

    /// Remove a node type
    pub fn remove(&mut self, name: &str) -> Option<NodeType> {
        self.types.shift_remove(name)
    }

    /// Get a node type by name
    pub fn get(&self, name: &str) -> Option<&NodeType> {
        self.types.get(name)
    }

    /// Get a mutable node type by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut NodeType> {
        self.types.get_mut(name)
    }

    /// Whether a type is registered
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// All registered types, in registration order
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
