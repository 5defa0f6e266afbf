//! Checkpoint snapshots and the pluggable store they live in.
//!
//! After every superstep the runner persists a [`Checkpoint`]: the merged
//! state, the pending frontier, and a monotonically increasing sequence
//! number, all keyed by session id. Stores are append-only; the engine
//! never mutates or deletes checkpoints, leaving retention to the caller.
//!
//! Sequence numbers serialize concurrent writers per session: a `put`
//! whose sequence is not strictly greater than the stored maximum fails
//! with [`CheckpointError::Conflict`], and the caller must retry from
//! fresh state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::runtime::persistence::PersistenceError;
use crate::runtime::runner::SessionState;
use crate::state::WorkflowState;
use crate::types::{NodeId, SessionId};

/// Immutable snapshot of one session after one superstep.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub session_id: SessionId,
    /// Superstep this snapshot was taken after; strictly increasing per
    /// session.
    pub sequence: u64,
    pub state: WorkflowState,
    /// Nodes pending execution in the next superstep.
    pub frontier: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Captures the given session under `session_id`.
    #[must_use]
    pub fn from_session(session_id: &str, session: &SessionState) -> Self {
        Self {
            session_id: session_id.to_string(),
            sequence: session.step,
            state: session.state.clone(),
            frontier: session.frontier.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Errors from checkpoint store operations.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointError {
    #[error("checkpoint sequence conflict for session `{session}` at sequence {sequence}")]
    #[diagnostic(
        code(graphloom::checkpoint::conflict),
        help("Another writer advanced this session; reload the latest checkpoint and retry.")
    )]
    Conflict { session: String, sequence: u64 },

    #[error("checkpoint backend error: {message}")]
    #[diagnostic(code(graphloom::checkpoint::backend))]
    Backend { message: String },

    #[error(transparent)]
    #[diagnostic(code(graphloom::checkpoint::persistence))]
    Persistence(#[from] PersistenceError),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Pluggable checkpoint persistence.
///
/// Implementations must provide at least session-scoped write
/// serialization so sequence numbers stay strictly increasing.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Append a checkpoint. Fails with [`CheckpointError::Conflict`] when
    /// the sequence does not advance past the stored maximum.
    async fn put(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Latest checkpoint for the session, if any.
    async fn get_latest(&self, session_id: &str) -> Result<Option<Checkpoint>>;

    /// All checkpoints for the session in insertion order, oldest first.
    async fn list(&self, session_id: &str) -> Result<Vec<Checkpoint>>;

    /// All known session ids.
    async fn list_sessions(&self) -> Result<Vec<SessionId>>;
}

/// Volatile store for tests, development, and single-process runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: Mutex<FxHashMap<SessionId, Vec<Checkpoint>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStore {
    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut sessions = self.sessions.lock().expect("checkpoint store poisoned");
        let lineage = sessions.entry(checkpoint.session_id.clone()).or_default();
        if let Some(last) = lineage.last() {
            if checkpoint.sequence <= last.sequence {
                return Err(CheckpointError::Conflict {
                    session: checkpoint.session_id,
                    sequence: checkpoint.sequence,
                });
            }
        }
        lineage.push(checkpoint);
        Ok(())
    }

    async fn get_latest(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        let sessions = self.sessions.lock().expect("checkpoint store poisoned");
        Ok(sessions.get(session_id).and_then(|l| l.last().cloned()))
    }

    async fn list(&self, session_id: &str) -> Result<Vec<Checkpoint>> {
        let sessions = self.sessions.lock().expect("checkpoint store poisoned");
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionId>> {
        let sessions = self.sessions.lock().expect("checkpoint store poisoned");
        Ok(sessions.keys().cloned().collect())
    }
}
