use rustc_hash::FxHashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use crate::reducers::{LastWrite, Reducer};
use crate::schema::{StateSchema, StateTypeError, json_kind};
use crate::state::{StateUpdate, WorkflowState};
use crate::types::NodeId;

static LAST_WRITE: LastWrite = LastWrite;

/// Field name to reducer mapping consulted at every barrier.
///
/// Fields without an entry use [`LastWrite`], the documented default.
#[derive(Clone, Default)]
pub struct ReducerRegistry {
    reducers: FxHashMap<String, Arc<dyn Reducer>>,
}

impl ReducerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a reducer for a field, replacing any earlier registration.
    pub fn register(&mut self, field: impl Into<String>, reducer: Arc<dyn Reducer>) -> &mut Self {
        self.reducers.insert(field.into(), reducer);
        self
    }

    /// Builder-style registration.
    ///
    /// ```rust
    /// use graphloom::reducers::{AppendList, ReducerRegistry, Sum};
    /// use std::sync::Arc;
    ///
    /// let registry = ReducerRegistry::new()
    ///     .with_reducer("results", Arc::new(AppendList))
    ///     .with_reducer("total", Arc::new(Sum));
    /// ```
    #[must_use]
    pub fn with_reducer(mut self, field: impl Into<String>, reducer: Arc<dyn Reducer>) -> Self {
        self.register(field, reducer);
        self
    }

    /// Resolves the reducer for a field, falling back to last-writer-wins.
    #[must_use]
    pub fn reducer_for(&self, field: &str) -> &dyn Reducer {
        self.reducers
            .get(field)
            .map(|r| r.as_ref())
            .unwrap_or(&LAST_WRITE)
    }

    /// Returns `true` when the field has an explicitly registered reducer.
    #[must_use]
    pub fn has_reducer(&self, field: &str) -> bool {
        self.reducers.contains_key(field)
    }
}

impl std::fmt::Debug for ReducerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut fields: Vec<_> = self.reducers.keys().collect();
        fields.sort();
        f.debug_struct("ReducerRegistry")
            .field("fields", &fields)
            .finish()
    }
}

/// Names of the fields a barrier actually changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub changed: Vec<String>,
}

/// Applies one superstep's worth of partial updates to the state.
///
/// `updates` must already be ordered by the producers' node-registration
/// order; this function applies them left to right, field by field, in
/// each update's own write order. Every incoming value is checked against
/// the schema before it reaches a reducer, so a type violation leaves the
/// state untouched for all later updates but may have applied earlier
/// ones. Callers treat the error as fatal for the invocation, which makes
/// that acceptable.
///
/// The state's revision is bumped exactly once when any field changed.
#[instrument(skip_all, fields(updates = updates.len()), err)]
pub fn merge_updates(
    schema: &StateSchema,
    registry: &ReducerRegistry,
    state: &mut WorkflowState,
    updates: &[(NodeId, StateUpdate)],
) -> Result<MergeOutcome, StateTypeError> {
    let mut changed: Vec<String> = Vec::new();

    for (producer, update) in updates {
        for (field, value) in update.iter() {
            let spec = schema
                .get(field)
                .ok_or_else(|| StateTypeError::UnknownField {
                    field: field.clone(),
                })?;
            if !spec.field_type.admits(value) {
                return Err(StateTypeError::Mismatch {
                    field: field.clone(),
                    expected: spec.field_type,
                    actual: json_kind(value),
                });
            }

            let reducer = registry.reducer_for(field);
            let current = state
                .fields()
                .get(field)
                .cloned()
                .unwrap_or_else(|| spec.default.clone());
            let merged = reducer.combine(&current, value.clone());
            if merged != current {
                if !changed.iter().any(|c| c == field) {
                    changed.push(field.clone());
                }
                tracing::debug!(
                    producer = %producer,
                    field = %field,
                    "field updated at barrier"
                );
            }
            state.fields_mut().insert(field.clone(), merged);
        }
    }

    if !changed.is_empty() {
        let revision = state.revision().saturating_add(1);
        state.set_revision(revision);
    }

    Ok(MergeOutcome { changed })
}
