// SPDX-License-Identifier: MIT OR Apache-2.0
//! Field value kinds and the coercion rules between raw input and stored values.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;

use crate::field::FieldId;
use crate::node::NodeId;

/// Kind of value a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Numeric value
    Number,
    /// Text
    String,
    /// True/false
    Boolean,
    /// Structured key/value literal
    Object,
    /// Structured list literal
    Array,
    /// Expression text, evaluated when the field produces output
    Function,
}

impl ValueType {
    /// All value kinds, in declaration order
    pub fn all() -> &'static [ValueType] {
        &[
            Self::Number,
            Self::String,
            Self::Boolean,
            Self::Object,
            Self::Array,
            Self::Function,
        ]
    }

    /// Tag used in snapshots
    pub fn name(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Function => "function",
        }
    }

    /// Value a field of this kind starts with when its schema gives no default
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Number => Value::from(0),
            Self::String => Value::String(String::new()),
            Self::Boolean => Value::Bool(false),
            Self::Object => Value::Object(serde_json::Map::new()),
            Self::Array => Value::Array(Vec::new()),
            // Identity expression
            Self::Function => Value::String("x".to_string()),
        }
    }

    /// Check if a field of this kind may feed a field of `other` kind
    pub fn is_compatible(&self, other: ValueType) -> bool {
        *self == other || *self == Self::Function || other == Self::Function
    }

    /// Convert a raw value into the stored form for this kind
    pub fn coerce(&self, raw: &Value) -> Result<Value, ValidationError> {
        match self {
            Self::Number => coerce_number(raw),
            Self::String | Self::Function => Ok(Value::String(to_text(raw))),
            Self::Boolean => Ok(Value::Bool(is_truthy(raw))),
            Self::Object => coerce_structured(raw, *self, Value::is_object),
            Self::Array => coerce_structured(raw, *self, Value::is_array),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| ValidationError::UnknownValueType(s.to_string()))
    }
}

/// Textual form of a value
pub fn to_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Truthiness of a value: false, 0, NaN, empty text and null are false
pub fn is_truthy(raw: &Value) -> bool {
    match raw {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn coerce_number(raw: &Value) -> Result<Value, ValidationError> {
    match raw {
        Value::Number(_) => Ok(raw.clone()),
        Value::Null => Ok(Value::from(0)),
        Value::Bool(b) => Ok(Value::from(u8::from(*b))),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(Value::from(0));
            }
            if let Ok(int) = trimmed.parse::<i64>() {
                return Ok(Value::from(int));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| ValidationError::NotANumber(s.clone()))
        }
        other => Err(ValidationError::NotANumber(other.to_string())),
    }
}

fn coerce_structured(
    raw: &Value,
    expected: ValueType,
    accepts: fn(&Value) -> bool,
) -> Result<Value, ValidationError> {
    let parsed = match raw {
        Value::String(text) => {
            serde_json::from_str::<Value>(text).map_err(|e| ValidationError::MalformedLiteral {
                expected,
                reason: e.to_string(),
            })?
        }
        other => other.clone(),
    };

    if accepts(&parsed) {
        Ok(parsed)
    } else {
        Err(ValidationError::MalformedLiteral {
            expected,
            reason: format!("got {}", describe(&parsed)),
        })
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Errors raised while building fields, coercing input or restoring a graph
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Value type tag outside the supported set
    #[error("Unknown value type: {0}")]
    UnknownValueType(String),

    /// Text that does not parse as a number
    #[error("Not a number: {0}")]
    NotANumber(String),

    /// Structured literal with bad syntax or the wrong shape
    #[error("Malformed {expected} literal: {reason}")]
    MalformedLiteral {
        /// Kind the literal was coerced to
        expected: ValueType,
        /// Parser message
        reason: String,
    },

    /// Two fields share an id
    #[error("Duplicate field id: {0}")]
    DuplicateFieldId(FieldId),

    /// Two nodes share an id
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    /// Node refers to a node type that is not defined
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Field connections form a loop
    #[error("Field connections form a cycle")]
    CyclicFieldConnections,
}
