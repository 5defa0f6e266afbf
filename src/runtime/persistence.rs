/*!
Serde-friendly persistence models for checkpoints.

These shapes are deliberately decoupled from the in-memory types so the
storage backends stay lean: conversion logic lives here as `From` /
`TryFrom` impls, and no I/O happens in this module.
*/

use chrono::Utc;
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::runtime::checkpoint::Checkpoint;
use crate::state::{ErrorRecord, WorkflowState};
use crate::types::NodeId;

/// Persisted shape of [`WorkflowState`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedState {
    #[serde(default)]
    pub fields: IndexMap<String, Value>,
    pub revision: u32,
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
}

/// Persisted shape of [`Checkpoint`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCheckpoint {
    pub session_id: String,
    pub sequence: u64,
    pub state: PersistedState,
    /// Frontier node ids as plain strings.
    pub frontier: Vec<String>,
    /// RFC 3339 creation time, keeping `chrono` types out of the wire
    /// shape.
    pub created_at: String,
}

/// Conversion and serialization errors for persistence models.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("JSON serialization/deserialization failed: {source}")]
    #[diagnostic(
        code(graphloom::persistence::serde),
        help("Ensure the stored JSON matches the persisted checkpoint shape.")
    )]
    Serde {
        #[source]
        source: serde_json::Error,
    },

    #[error("persistence error: {0}")]
    #[diagnostic(code(graphloom::persistence::other))]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

pub fn to_json_string<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| PersistenceError::Serde { source: e })
}

pub fn from_json_str<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| PersistenceError::Serde { source: e })
}

impl From<&WorkflowState> for PersistedState {
    fn from(state: &WorkflowState) -> Self {
        PersistedState {
            fields: state.fields().clone(),
            revision: state.revision(),
            errors: state.errors().to_vec(),
        }
    }
}

impl From<PersistedState> for WorkflowState {
    fn from(p: PersistedState) -> Self {
        WorkflowState::from_parts(p.fields, p.revision, p.errors)
    }
}

impl From<&Checkpoint> for PersistedCheckpoint {
    fn from(cp: &Checkpoint) -> Self {
        PersistedCheckpoint {
            session_id: cp.session_id.clone(),
            sequence: cp.sequence,
            state: PersistedState::from(&cp.state),
            frontier: cp.frontier.iter().map(|id| id.to_string()).collect(),
            created_at: cp.created_at.to_rfc3339(),
        }
    }
}

impl From<PersistedCheckpoint> for Checkpoint {
    fn from(p: PersistedCheckpoint) -> Self {
        let created_at = chrono::DateTime::parse_from_rfc3339(&p.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Checkpoint {
            session_id: p.session_id,
            sequence: p.sequence,
            state: WorkflowState::from(p.state),
            frontier: p.frontier.into_iter().map(NodeId::from).collect(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checkpoint_json_round_trip() {
        let mut fields = IndexMap::new();
        fields.insert("count".to_string(), json!(3));
        fields.insert("label".to_string(), json!("busy"));
        let state = WorkflowState::from_parts(
            fields,
            4,
            vec![ErrorRecord {
                node: "fetch".into(),
                step: 2,
                message: "provider unavailable".into(),
            }],
        );
        let checkpoint = Checkpoint {
            session_id: "sess-1".into(),
            sequence: 4,
            state,
            frontier: vec!["combine".into()],
            created_at: Utc::now(),
        };

        let persisted = PersistedCheckpoint::from(&checkpoint);
        let json = to_json_string(&persisted).unwrap();
        let restored: PersistedCheckpoint = from_json_str(&json).unwrap();
        let restored = Checkpoint::from(restored);

        assert_eq!(restored.session_id, checkpoint.session_id);
        assert_eq!(restored.sequence, checkpoint.sequence);
        assert_eq!(restored.state, checkpoint.state);
        assert_eq!(restored.frontier, checkpoint.frontier);
    }
}
