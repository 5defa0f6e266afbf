//! State schema declaration and type conformance checks.
//!
//! A workflow's shared state is a fixed set of named fields. Each field
//! declares its type and default value at graph-definition time; every
//! value merged into the state afterwards must remain assignable to that
//! declared type. Violations surface as [`StateTypeError`] and abort the
//! invocation.
//!
//! # Examples
//!
//! ```rust
//! use graphloom::schema::{FieldType, StateSchema};
//! use serde_json::json;
//!
//! let schema = StateSchema::new()
//!     .field("number", FieldType::Integer)
//!     .field_with_default("results", FieldType::List, json!([]))
//!     .field_with_default("greeting", FieldType::Text, json!("hello"));
//!
//! assert!(FieldType::Integer.admits(&json!(5)));
//! assert!(!FieldType::Integer.admits(&json!(5.5)));
//!
//! let initial = schema.default_state();
//! assert_eq!(initial.get("greeting"), Some(&json!("hello")));
//! ```

use indexmap::IndexMap;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Declared type of a state field.
///
/// Types are checked structurally against `serde_json::Value` shapes.
/// `Integer` admits only integral JSON numbers while `Float` admits any
/// number; `Any` opts a field out of type checking entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Bool,
    Integer,
    Float,
    Text,
    List,
    Object,
    Any,
}

impl FieldType {
    /// Returns `true` when `value` is assignable to this field type.
    #[must_use]
    pub fn admits(&self, value: &Value) -> bool {
        match self {
            FieldType::Bool => value.is_boolean(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Text => value.is_string(),
            FieldType::List => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => true,
        }
    }

    /// The natural zero value for this type, used as the implicit default
    /// when a field is declared without one.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        match self {
            FieldType::Bool => Value::Bool(false),
            FieldType::Integer => Value::from(0_i64),
            FieldType::Float => Value::from(0.0_f64),
            FieldType::Text => Value::String(String::new()),
            FieldType::List => Value::Array(Vec::new()),
            FieldType::Object => Value::Object(serde_json::Map::new()),
            FieldType::Any => Value::Null,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Bool => "bool",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::List => "list",
            FieldType::Object => "object",
            FieldType::Any => "any",
        };
        f.write_str(name)
    }
}

/// Short label for the JSON kind of a value, used in error messages.
#[must_use]
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Declaration of a single state field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub default: Value,
}

/// Ordered collection of field declarations.
///
/// Field order is the declaration order and is preserved through the whole
/// engine: state maps, snapshots, and persisted checkpoints all iterate
/// fields in this order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateSchema {
    fields: IndexMap<String, FieldSpec>,
}

impl StateSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field with the type's zero value as default.
    #[must_use]
    pub fn field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        let default = field_type.zero_value();
        self.field_with_default(name, field_type, default)
    }

    /// Declares a field with an explicit default value.
    ///
    /// Re-declaring a field replaces the earlier declaration. Defaults are
    /// validated during graph compilation, not here.
    #[must_use]
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        default: Value,
    ) -> Self {
        let name = name.into();
        self.fields.insert(
            name.clone(),
            FieldSpec {
                name,
                field_type,
                default,
            },
        );
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    /// Builds the initial field map: every declared field at its default.
    #[must_use]
    pub fn default_state(&self) -> IndexMap<String, Value> {
        self.fields
            .iter()
            .map(|(name, spec)| (name.clone(), spec.default.clone()))
            .collect()
    }
}

/// A value was not assignable to its field's declared type, or targeted a
/// field the schema does not declare.
///
/// Raised by the barrier merge stage and by initial-state validation. Never
/// retried by the engine.
#[derive(Debug, Error, Diagnostic)]
pub enum StateTypeError {
    #[error("field `{field}` expects {expected}, got {actual}")]
    #[diagnostic(
        code(graphloom::schema::type_mismatch),
        help("Check the node's output against the field's declared type.")
    )]
    Mismatch {
        field: String,
        expected: FieldType,
        actual: &'static str,
    },

    #[error("unknown state field `{field}`")]
    #[diagnostic(
        code(graphloom::schema::unknown_field),
        help("Declare the field on the schema before writing to it.")
    )]
    UnknownField { field: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_rejects_fractional_numbers() {
        assert!(FieldType::Integer.admits(&json!(3)));
        assert!(!FieldType::Integer.admits(&json!(3.5)));
        assert!(FieldType::Float.admits(&json!(3)));
        assert!(FieldType::Float.admits(&json!(3.5)));
    }

    #[test]
    fn declaration_order_is_preserved() {
        let schema = StateSchema::new()
            .field("b", FieldType::Text)
            .field("a", FieldType::Integer);
        let names: Vec<_> = schema.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn redeclaration_replaces_earlier_spec() {
        let schema = StateSchema::new()
            .field("x", FieldType::Integer)
            .field_with_default("x", FieldType::Text, json!("later"));
        let spec = schema.get("x").unwrap();
        assert_eq!(spec.field_type, FieldType::Text);
        assert_eq!(spec.default, json!("later"));
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn json_kind_labels() {
        assert_eq!(json_kind(&json!(1)), "integer");
        assert_eq!(json_kind(&json!(1.5)), "float");
        assert_eq!(json_kind(&json!("s")), "text");
        assert_eq!(json_kind(&json!([])), "list");
    }
}
