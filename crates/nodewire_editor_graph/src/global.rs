// SPDX-License-Identifier: MIT OR Apache-2.0
//! Global sections: named bags of fields shared by the whole graph.

use crate::field::{Field, FieldId, FieldSchema};
use crate::value::ValidationError;
use serde_json::Value;

/// A freestanding group of fields with no type or position
#[derive(Debug, Clone)]
pub struct GlobalSection {
    /// Section name, unique within the graph
    pub name: String,
    fields: Vec<Field>,
}

impl GlobalSection {
    /// Create an empty section
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub(crate) fn from_parts(name: String, fields: Vec<Field>) -> Self {
        Self { name, fields }
    }

    /// Add a field. An existing field with the same name takes over the
    /// declaration and keeps its ID, value and connections.
    pub fn add_field(&mut self, schema: &FieldSchema) -> FieldId {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == schema.name) {
            existing.adopt_schema(schema);
            return existing.id;
        }
        let field = Field::from_schema(schema);
        let id = field.id;
        self.fields.push(field);
        id
    }

    /// Remove a field by name
    pub fn remove_field(&mut self, name: &str) -> Option<Field> {
        let index = self.fields.iter().position(|f| f.name == name)?;
        Some(self.fields.remove(index))
    }

    /// Fields, in insertion order
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

    /// Get a field's raw value by name
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.field(name).map(Field::value)
    }

    /// Coerce and store a value by field name. Returns the field's ID, or
    /// `None` if the section has no such field.
    ///
    /// This does not propagate; go through
    /// [`GraphEditor::set_global_value`](crate::GraphEditor::set_global_value)
    /// to push the value downstream.
    pub fn set_value(&mut self, name: &str, raw: &Value) -> Result<Option<FieldId>, ValidationError> {
        let Some(field) = self.fields.iter_mut().find(|f| f.name == name) else {
            return Ok(None);
        };
        field.set_value(raw)?;
        Ok(Some(field.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;
    use serde_json::json;

    #[test]
    fn test_field_by_name() {
        let mut section = GlobalSection::new("World");
        let id = section.add_field(&FieldSchema::new("Gold", ValueType::Number));

        assert_eq!(section.set_value("Gold", &json!("40")).unwrap(), Some(id));
        assert_eq!(section.value("Gold"), Some(&json!(40)));
        assert_eq!(section.set_value("Silver", &json!(1)).unwrap(), None);
        assert!(section.set_value("Gold", &json!("lots")).is_err());
        assert_eq!(section.value("Gold"), Some(&json!(40)));
    }

    #[test]
    fn test_readding_keeps_identity() {
        let mut section = GlobalSection::new("World");
        let first = section.add_field(&FieldSchema::new("Flag", ValueType::Boolean));
        section.set_value("Flag", &json!(true)).unwrap();

        let second = section.add_field(&FieldSchema::new("Flag", ValueType::Boolean).required());
        assert_eq!(first, second);
        assert_eq!(section.value("Flag"), Some(&json!(true)));
        assert!(section.field("Flag").unwrap().required);

        assert!(section.remove_field("Flag").is_some());
        assert!(section.fields().is_empty());
    }
}
