//! Session management and the superstep execution loop.
//!
//! [`Runner`] drives compiled workflows: it owns the per-session state,
//! executes supersteps (concurrent node runs, barrier merge, frontier
//! resolution), persists a checkpoint after every step, and enforces the
//! superstep ceiling and failure policy. Supersteps of one session are
//! strictly sequential; only nodes within a superstep run concurrently.

use indexmap::IndexMap;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::event_bus::{Event, EventBus};
use crate::reducers::merge_updates;
use crate::runtime::checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
use crate::runtime::config::ErrorPolicy;
use crate::runtime::scheduler::{NodeFailure, Scheduler};
use crate::schema::{StateSchema, StateTypeError};
use crate::state::{ErrorRecord, StateUpdate, WorkflowState};
use crate::types::{EdgeTarget, NodeId, Route};
use crate::workflow::Workflow;

/// Per-session execution state carried across supersteps.
#[derive(Clone, Debug)]
pub struct SessionState {
    /// Merged workflow state after the last completed superstep.
    pub state: WorkflowState,
    /// Number of completed supersteps.
    pub step: u64,
    /// Nodes scheduled for the next superstep.
    pub frontier: Vec<NodeId>,
}

/// How a session came into existence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionInit {
    /// Brand-new session seeded from defaults plus the initial update.
    Fresh,
    /// Re-seeded from the latest stored checkpoint.
    Resumed { checkpoint_sequence: u64 },
}

/// Result of one completed superstep.
#[derive(Clone, Debug)]
pub struct StepReport {
    /// Superstep number that was executed.
    pub step: u64,
    /// Nodes that ran and produced an update, in frontier order.
    pub ran: Vec<NodeId>,
    /// Frontier scheduled for the next superstep.
    pub next_frontier: Vec<NodeId>,
    /// Post-merge values of every field this superstep changed.
    pub changed: IndexMap<String, Value>,
    /// Error records appended under the best-effort policy.
    pub new_errors: Vec<ErrorRecord>,
    /// Whether the session reached a terminal frontier.
    pub completed: bool,
}

/// Errors surfaced by the runner.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("session not found: {session_id}")]
    #[diagnostic(code(graphloom::runner::session_not_found))]
    SessionNotFound { session_id: String },

    #[error("node `{node}` failed: {source}")]
    #[diagnostic(
        code(graphloom::runner::node_execution),
        help("The checkpoint of the last good superstep remains available for resume.")
    )]
    NodeExecution {
        node: NodeId,
        #[source]
        source: NodeFailure,
    },

    #[error("router on `{node}` returned unknown target `{target}`")]
    #[diagnostic(
        code(graphloom::runner::routing),
        help("Routers may only return node ids registered on the graph.")
    )]
    Routing { node: NodeId, target: NodeId },

    #[error("superstep ceiling of {limit} exceeded")]
    #[diagnostic(
        code(graphloom::runner::max_steps),
        help("Likely an unguarded cycle; add an exit route or raise max_supersteps.")
    )]
    MaxStepsExceeded { limit: u64 },

    #[error(transparent)]
    #[diagnostic(code(graphloom::runner::state_type))]
    StateType(#[from] StateTypeError),

    #[error(transparent)]
    #[diagnostic(code(graphloom::runner::checkpoint))]
    Checkpoint(#[from] CheckpointError),

    #[error("invocation cancelled for session {session_id}")]
    #[diagnostic(code(graphloom::runner::cancelled))]
    Cancelled { session_id: String },

    #[error("workflow task join error: {0}")]
    #[diagnostic(code(graphloom::runner::join))]
    Join(#[from] JoinError),
}

/// Runtime engine executing compiled workflows session by session.
///
/// One runner can hold many isolated sessions against the same workflow.
/// The `&mut self` surface of [`run_step`](Self::run_step) is what
/// serializes barrier merges per session.
pub struct Runner {
    workflow: Arc<Workflow>,
    sessions: FxHashMap<String, SessionState>,
    store: Arc<dyn CheckpointStore>,
    scheduler: Scheduler,
    event_bus: EventBus,
    cancel: CancellationToken,
}

impl Runner {
    /// Builds a runner with the store and event bus selected by the
    /// workflow's configuration.
    pub async fn new(workflow: Arc<Workflow>) -> Result<Self, RunnerError> {
        let store = workflow.config().build_store().await?;
        let event_bus = workflow.config().event_bus.build_event_bus();
        Ok(Self::with_parts(
            workflow,
            store,
            event_bus,
            CancellationToken::new(),
        ))
    }

    /// Builds a runner from explicit parts. Useful for sharing a store
    /// across runners (resume) or injecting a memory sink in tests.
    pub fn with_parts(
        workflow: Arc<Workflow>,
        store: Arc<dyn CheckpointStore>,
        event_bus: EventBus,
        cancel: CancellationToken,
    ) -> Self {
        let scheduler = Scheduler::new(workflow.config().effective_concurrency());
        event_bus.listen();
        Self {
            workflow,
            sessions: FxHashMap::default(),
            store,
            scheduler,
            event_bus,
            cancel,
        }
    }

    /// Token observed before every superstep; cancel it to stop
    /// scheduling further supersteps.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn session(&self, session_id: &str) -> Option<&SessionState> {
        self.sessions.get(session_id)
    }

    #[must_use]
    pub fn list_sessions(&self) -> Vec<&String> {
        self.sessions.keys().collect()
    }

    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Initializes a session, resuming from the latest checkpoint when the
    /// store already has one for this id.
    ///
    /// On resume the caller-supplied initial update is ignored; the
    /// checkpointed state is authoritative.
    #[instrument(skip(self, initial), err)]
    pub async fn create_session(
        &mut self,
        session_id: &str,
        initial: StateUpdate,
    ) -> Result<SessionInit, RunnerError> {
        if let Some(checkpoint) = self.store.get_latest(session_id).await? {
            let sequence = checkpoint.sequence;
            self.sessions.insert(
                session_id.to_string(),
                SessionState {
                    state: checkpoint.state,
                    step: checkpoint.sequence,
                    frontier: checkpoint.frontier,
                },
            );
            return Ok(SessionInit::Resumed {
                checkpoint_sequence: sequence,
            });
        }

        let mut state = WorkflowState::from_schema(self.workflow.schema());
        apply_initial(self.workflow.schema(), &mut state, &initial)?;
        let session = SessionState {
            state,
            step: 0,
            frontier: vec![self.workflow.entry().clone()],
        };
        self.store
            .put(Checkpoint::from_session(session_id, &session))
            .await?;
        self.sessions.insert(session_id.to_string(), session);
        Ok(SessionInit::Fresh)
    }

    /// Executes exactly one superstep for the session.
    ///
    /// Runs the frontier concurrently against the pre-superstep snapshot,
    /// merges the ordered outputs at the barrier, resolves the next
    /// frontier against the merged state, and persists a checkpoint before
    /// returning. Nodes that failed contribute neither updates nor
    /// frontier targets.
    #[instrument(skip(self), err)]
    pub async fn run_step(&mut self, session_id: &str) -> Result<StepReport, RunnerError> {
        if self.cancel.is_cancelled() {
            return Err(RunnerError::Cancelled {
                session_id: session_id.to_string(),
            });
        }

        let workflow = self.workflow.clone();
        let session =
            self.sessions
                .get_mut(session_id)
                .ok_or_else(|| RunnerError::SessionNotFound {
                    session_id: session_id.to_string(),
                })?;

        if session.frontier.is_empty() {
            return Ok(StepReport {
                step: session.step,
                ran: Vec::new(),
                next_frontier: Vec::new(),
                changed: IndexMap::new(),
                new_errors: Vec::new(),
                completed: true,
            });
        }

        let limit = workflow.config().max_supersteps;
        if session.step >= limit {
            return Err(RunnerError::MaxStepsExceeded { limit });
        }

        let step = session.step + 1;
        tracing::debug!(session = %session_id, step, "starting superstep");

        let snapshot = session.state.snapshot();
        let mut output = self
            .scheduler
            .superstep(
                workflow.nodes(),
                &session.frontier,
                snapshot,
                step,
                workflow.config().node_timeout,
                self.event_bus.sender(),
            )
            .await;

        if workflow.config().error_policy == ErrorPolicy::FailFast && !output.failures.is_empty() {
            let (node, failure) = output.failures.remove(0);
            let _ = self.event_bus.sender().send(Event::diagnostic(
                "superstep",
                format!("session={session_id} step={step} failed node={node}: {failure}"),
            ));
            return Err(RunnerError::NodeExecution {
                node,
                source: failure,
            });
        }

        let ran: Vec<NodeId> = output.outputs.iter().map(|(id, _)| id.clone()).collect();

        // Barrier merge in node-registration order of the producers.
        let mut ordered = output.outputs;
        ordered.sort_by_key(|(id, _)| workflow.registration_index(id));
        let outcome = merge_updates(
            workflow.schema(),
            workflow.reducers(),
            &mut session.state,
            &ordered,
        )?;
        tracing::debug!(
            session = %session_id,
            step,
            changed = ?outcome.changed,
            "barrier applied"
        );

        let new_errors: Vec<ErrorRecord> = output
            .failures
            .iter()
            .map(|(node, failure)| ErrorRecord {
                node: node.to_string(),
                step,
                message: failure.to_string(),
            })
            .collect();
        if !new_errors.is_empty() {
            session.state.record_errors(new_errors.clone());
        }

        // Routers see the merged state, never the pre-superstep snapshot.
        let merged_snapshot = session.state.snapshot();
        let mut next_frontier: Vec<NodeId> = Vec::new();
        for id in &ran {
            let mut targets: Vec<NodeId> = Vec::new();
            if let Some(edges) = workflow.edges().get(id) {
                for target in edges {
                    if let EdgeTarget::Node(to) = target {
                        targets.push(to.clone());
                    }
                }
            }
            for router in workflow.routers().iter().filter(|r| r.from() == id) {
                match (router.router())(&merged_snapshot) {
                    Route::To(to) => targets.push(to),
                    Route::ToAll(tos) => targets.extend(tos),
                    Route::End => {}
                }
            }
            for target in targets {
                if !workflow.nodes().contains_key(&target) {
                    return Err(RunnerError::Routing {
                        node: id.clone(),
                        target,
                    });
                }
                // Fan-in: one entry per node regardless of predecessors.
                if !next_frontier.contains(&target) {
                    next_frontier.push(target);
                }
            }
        }
        tracing::debug!(session = %session_id, step, next_frontier = ?next_frontier, "computed next frontier");

        session.step = step;
        session.frontier = next_frontier.clone();

        let changed: IndexMap<String, Value> = outcome
            .changed
            .iter()
            .filter_map(|field| {
                session
                    .state
                    .get(field)
                    .map(|value| (field.clone(), value.clone()))
            })
            .collect();

        let checkpoint = Checkpoint::from_session(session_id, session);
        self.store.put(checkpoint).await?;

        let completed = next_frontier.is_empty();
        Ok(StepReport {
            step,
            ran,
            next_frontier,
            changed,
            new_errors,
            completed,
        })
    }

    /// Drives the session until the frontier is empty.
    #[instrument(skip(self), err)]
    pub async fn run_until_complete(
        &mut self,
        session_id: &str,
    ) -> Result<WorkflowState, RunnerError> {
        tracing::info!(session = %session_id, "workflow run started");
        loop {
            let report = self.run_step(session_id).await?;
            if report.completed {
                break;
            }
        }
        let final_state = self.final_state(session_id)?;
        tracing::info!(session = %session_id, "workflow run completed");
        Ok(final_state)
    }

    /// Clone of the session's current merged state.
    pub fn final_state(&self, session_id: &str) -> Result<WorkflowState, RunnerError> {
        self.sessions
            .get(session_id)
            .map(|s| s.state.clone())
            .ok_or_else(|| RunnerError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }
}

/// Overlay the caller's initial partial state onto the schema defaults.
fn apply_initial(
    schema: &StateSchema,
    state: &mut WorkflowState,
    initial: &StateUpdate,
) -> Result<(), StateTypeError> {
    for (field, value) in initial.iter() {
        let spec = schema
            .get(field)
            .ok_or_else(|| StateTypeError::UnknownField {
                field: field.clone(),
            })?;
        if !spec.field_type.admits(value) {
            return Err(StateTypeError::Mismatch {
                field: field.clone(),
                expected: spec.field_type,
                actual: crate::schema::json_kind(value),
            });
        }
        state.fields_mut().insert(field.clone(), value.clone());
    }
    Ok(())
}
