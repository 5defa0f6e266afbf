//! State containers flowing through workflow execution.
//!
//! The engine distinguishes three shapes of state data:
//!
//! - [`WorkflowState`]: the live, merged state owned by the runtime. Only
//!   the barrier merge stage ever mutates it; nodes never see it directly.
//! - [`StateSnapshot`]: an immutable copy handed to every node and router.
//!   Sibling nodes in one superstep all receive the same pre-superstep
//!   snapshot and cannot observe each other's output.
//! - [`StateUpdate`]: the partial update a node returns, naming only the
//!   fields it wants to change.
//!
//! Alongside the declared fields, every state carries an error lane of
//! [`ErrorRecord`]s. Under the best-effort failure policy, a failing node's
//! error is recorded there while its sibling updates still merge.
//!
//! # Examples
//!
//! ```rust
//! use graphloom::state::StateUpdate;
//! use serde_json::json;
//!
//! let update = StateUpdate::new()
//!     .with("cleaned", json!("hello world"))
//!     .with("attempt", json!(1));
//! assert_eq!(update.len(), 2);
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::StateSchema;

/// The live state of one workflow session.
///
/// Holds the declared fields in schema order, a revision counter bumped
/// once per barrier that changed any field, and the error lane populated
/// under the best-effort policy.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowState {
    fields: IndexMap<String, Value>,
    revision: u32,
    errors: Vec<ErrorRecord>,
}

impl WorkflowState {
    /// Creates a state with every schema field at its default value.
    pub(crate) fn from_schema(schema: &StateSchema) -> Self {
        Self {
            fields: schema.default_state(),
            revision: 1,
            errors: Vec::new(),
        }
    }

    /// Reassembles a state from persisted parts.
    pub(crate) fn from_parts(
        fields: IndexMap<String, Value>,
        revision: u32,
        errors: Vec<ErrorRecord>,
    ) -> Self {
        Self {
            fields,
            revision,
            errors,
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn revision(&self) -> u32 {
        self.revision
    }

    #[must_use]
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Clones the current state into an immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            fields: self.fields.clone(),
            revision: self.revision,
            errors: self.errors.clone(),
        }
    }

    pub(crate) fn fields_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.fields
    }

    pub(crate) fn set_revision(&mut self, revision: u32) {
        self.revision = revision;
    }

    pub(crate) fn record_errors(&mut self, records: impl IntoIterator<Item = ErrorRecord>) {
        self.errors.extend(records);
    }
}

/// Immutable view of the state at a superstep boundary.
///
/// Snapshots are what nodes and routers receive. The typed accessors are
/// conveniences for the common JSON shapes; they return `None` both for
/// missing fields and for mismatched shapes.
#[derive(Clone, Debug, PartialEq)]
pub struct StateSnapshot {
    pub fields: IndexMap<String, Value>,
    pub revision: u32,
    pub errors: Vec<ErrorRecord>,
}

impl StateSnapshot {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn integer(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn float(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    #[must_use]
    pub fn boolean(&self, field: &str) -> Option<bool> {
        self.fields.get(field).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn list(&self, field: &str) -> Option<&Vec<Value>> {
        self.fields.get(field).and_then(Value::as_array)
    }
}

/// Partial state update produced by one node execution.
///
/// Field insertion order is preserved and respected by the merge stage, so
/// a node writing the same field twice applies the later value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateUpdate {
    fields: IndexMap<String, Value>,
}

impl StateUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field write.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) -> &mut Self {
        self.fields.insert(field.into(), value);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl From<IndexMap<String, Value>> for StateUpdate {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Self { fields }
    }
}

/// One recorded node failure, kept on the state's error lane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Node that failed.
    pub node: String,
    /// Superstep in which the failure occurred.
    pub step: u64,
    /// Rendered failure message.
    pub message: String,
}

/// Per-superstep change set yielded by the streaming execution mode.
///
/// Contains the post-merge values of every field the superstep changed,
/// plus any error records appended during the superstep.
#[derive(Clone, Debug, PartialEq)]
pub struct StateDelta {
    pub step: u64,
    pub changed: IndexMap<String, Value>,
    pub errors: Vec<ErrorRecord>,
}
