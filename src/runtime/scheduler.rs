//! Concurrent execution of one superstep's frontier.
//!
//! All frontier nodes run against the same pre-superstep snapshot, spawned
//! as independent tasks under a shared semaphore. Blocking work in one
//! node never delays its siblings beyond the configured concurrency cap,
//! which is what makes simultaneous external calls from parallel branches
//! actually simultaneous.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::instrument;

use crate::event_bus::Event;
use crate::node::{Node, NodeContext, NodeError};
use crate::state::{StateSnapshot, StateUpdate};
use crate::types::NodeId;

/// Why one node's execution produced no update.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeFailure {
    #[error(transparent)]
    #[diagnostic(code(graphloom::scheduler::node))]
    Node(#[from] NodeError),

    #[error("node execution timed out after {0:?}")]
    #[diagnostic(
        code(graphloom::scheduler::timeout),
        help("Raise the node timeout or make the node's external call faster.")
    )]
    Timeout(Duration),

    #[error("node task join error: {0}")]
    #[diagnostic(code(graphloom::scheduler::join))]
    Join(#[from] tokio::task::JoinError),
}

/// Result of executing one frontier.
///
/// `outputs` holds the successful updates in frontier order; `failures`
/// holds everything else. The failure policy upstream decides what the
/// failures mean.
#[derive(Debug, Default)]
pub struct SuperstepOutput {
    pub outputs: Vec<(NodeId, StateUpdate)>,
    pub failures: Vec<(NodeId, NodeFailure)>,
}

/// Runs frontiers with bounded concurrency.
#[derive(Clone, Debug)]
pub struct Scheduler {
    limit: usize,
}

impl Scheduler {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    /// Execute every frontier node once against `snapshot`.
    ///
    /// Completion order is arbitrary; outputs are re-ordered into frontier
    /// order before returning so downstream merging stays deterministic.
    /// A frontier entry with no registered implementation is skipped with
    /// a warning rather than failing the run.
    #[instrument(skip_all, fields(step = step, frontier_len = frontier.len()))]
    pub async fn superstep(
        &self,
        nodes: &FxHashMap<NodeId, Arc<dyn Node>>,
        frontier: &[NodeId],
        snapshot: StateSnapshot,
        step: u64,
        timeout: Option<Duration>,
        event_sender: flume::Sender<Event>,
    ) -> SuperstepOutput {
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut join_set: JoinSet<(NodeId, Result<StateUpdate, NodeFailure>)> = JoinSet::new();

        for id in frontier {
            let Some(node) = nodes.get(id).cloned() else {
                tracing::warn!(step, node = %id, "frontier node not found; skipping");
                continue;
            };
            let id = id.clone();
            let snapshot = snapshot.clone();
            let semaphore = semaphore.clone();
            let ctx = NodeContext {
                node_id: id.clone(),
                step,
                event_sender: event_sender.clone(),
            };

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("superstep semaphore closed");
                let result = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, node.run(snapshot, ctx)).await
                    {
                        Ok(run) => run.map_err(NodeFailure::from),
                        Err(_) => Err(NodeFailure::Timeout(limit)),
                    },
                    None => node.run(snapshot, ctx).await.map_err(NodeFailure::from),
                };
                (id, result)
            });
        }

        let mut by_id: FxHashMap<NodeId, StateUpdate> = FxHashMap::default();
        let mut failures: Vec<(NodeId, NodeFailure)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((id, Ok(update))) => {
                    by_id.insert(id, update);
                }
                Ok((id, Err(failure))) => {
                    tracing::debug!(step, node = %id, error = %failure, "node failed");
                    failures.push((id, failure));
                }
                Err(join_error) => {
                    failures.push((NodeId::from("?"), NodeFailure::Join(join_error)));
                }
            }
        }

        // Completion order is nondeterministic; pin outputs to frontier
        // order and failures to the same.
        let outputs = frontier
            .iter()
            .filter_map(|id| by_id.remove(id).map(|update| (id.clone(), update)))
            .collect();
        failures.sort_by_key(|(id, _)| {
            frontier
                .iter()
                .position(|f| f == id)
                .unwrap_or(frontier.len())
        });

        SuperstepOutput { outputs, failures }
    }
}
