//! Per-field merge rules applied at superstep barriers.
//!
//! When several nodes of one superstep write to the state, their partial
//! updates are combined through this module. Each field resolves to a
//! [`Reducer`]: either one registered explicitly for that field, or the
//! documented default of last-writer-wins.
//!
//! Updates are applied left to right in the node-registration order of the
//! producers, which makes the outcome deterministic even when the nodes
//! themselves finished in an arbitrary order. For fields with an
//! associative reducer such as [`Sum`], the result is additionally
//! independent of that documented order.

mod registry;

pub use registry::{MergeOutcome, ReducerRegistry, merge_updates};

use serde_json::Value;

/// A pure combining function for one field.
///
/// `combine` receives the field's current value and one incoming value and
/// returns the merged result. It is invoked once per incoming update.
/// Reducers should be associative where possible; the engine guarantees a
/// deterministic application order either way.
pub trait Reducer: Send + Sync {
    fn combine(&self, current: &Value, incoming: Value) -> Value;
}

/// Default rule: the incoming value replaces the current one.
///
/// This is what every field without a registered reducer gets. With several
/// concurrent writers the surviving value is the one from the producer
/// registered last, which is deterministic but usually not what you want;
/// register a real reducer for fields with concurrent writers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LastWrite;

impl Reducer for LastWrite {
    fn combine(&self, _current: &Value, incoming: Value) -> Value {
        incoming
    }
}

/// List concatenation.
///
/// Appends the incoming elements to the current list. An incoming value
/// that is not a list is appended as a single element, which only occurs on
/// `Any`-typed fields since `List` fields reject non-list updates earlier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppendList;

impl Reducer for AppendList {
    fn combine(&self, current: &Value, incoming: Value) -> Value {
        let mut merged = match current {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        match incoming {
            Value::Array(items) => merged.extend(items),
            other => merged.push(other),
        }
        Value::Array(merged)
    }
}

/// Numeric addition.
///
/// Integer inputs stay integral; any fractional operand promotes the result
/// to a float. Non-numeric operands fall back to last-writer-wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sum;

impl Reducer for Sum {
    fn combine(&self, current: &Value, incoming: Value) -> Value {
        if let (Some(a), Some(b)) = (current.as_i64(), incoming.as_i64()) {
            return Value::from(a.saturating_add(b));
        }
        if let (Some(a), Some(b)) = (current.as_f64(), incoming.as_f64()) {
            return Value::from(a + b);
        }
        incoming
    }
}
