//! Compiled workflows and the invocation API.
//!
//! A [`Workflow`] is the immutable artifact produced by
//! [`GraphBuilder::compile`](crate::graph::GraphBuilder::compile). It owns
//! the node registry, topology, schema, reducers, and runtime
//! configuration, and exposes the two execution modes:
//!
//! - [`invoke`](Workflow::invoke): run to completion, returning the final
//!   merged state;
//! - [`stream`](Workflow::stream): run in the background, yielding one
//!   [`StateDelta`] per completed superstep.
//!
//! Session-scoped variants (`invoke_session`, `stream_session`) correlate
//! invocations with a checkpoint lineage: re-invoking with a session id
//! that already has checkpoints resumes from the latest one.

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::graph::RouterEdge;
use crate::node::Node;
use crate::reducers::ReducerRegistry;
use crate::runtime::runner::{Runner, RunnerError, SessionInit};
use crate::runtime::RunConfig;
use crate::schema::StateSchema;
use crate::state::{StateDelta, StateUpdate, WorkflowState};
use crate::types::{EdgeTarget, NodeId};
use crate::util::id_generator::IdGenerator;

/// An immutable, executable workflow graph.
///
/// Compiled once, invoked many times; every invocation gets its own runner
/// and session. Cloning is cheap where it matters (nodes and routers are
/// reference-counted).
#[derive(Clone)]
pub struct Workflow {
    nodes: FxHashMap<NodeId, Arc<dyn Node>>,
    registration_order: Vec<NodeId>,
    registration_index: FxHashMap<NodeId, usize>,
    edges: FxHashMap<NodeId, Vec<EdgeTarget>>,
    routers: Vec<RouterEdge>,
    entry: NodeId,
    schema: StateSchema,
    reducers: ReducerRegistry,
    config: RunConfig,
}

impl Workflow {
    /// Internal factory used by graph compilation.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        nodes: FxHashMap<NodeId, Arc<dyn Node>>,
        registration_order: Vec<NodeId>,
        edges: FxHashMap<NodeId, Vec<EdgeTarget>>,
        routers: Vec<RouterEdge>,
        entry: NodeId,
        schema: StateSchema,
        reducers: ReducerRegistry,
        config: RunConfig,
    ) -> Self {
        let registration_index = registration_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        Self {
            nodes,
            registration_order,
            registration_index,
            edges,
            routers,
            entry,
            schema,
            reducers,
            config,
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &FxHashMap<NodeId, Arc<dyn Node>> {
        &self.nodes
    }

    /// Node ids in registration order.
    #[must_use]
    pub fn registration_order(&self) -> &[NodeId] {
        &self.registration_order
    }

    /// Position of a node in the registration order; unknown ids sort
    /// last.
    #[must_use]
    pub fn registration_index(&self, id: &NodeId) -> usize {
        self.registration_index
            .get(id)
            .copied()
            .unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn edges(&self) -> &FxHashMap<NodeId, Vec<EdgeTarget>> {
        &self.edges
    }

    #[must_use]
    pub fn routers(&self) -> &[RouterEdge] {
        &self.routers
    }

    #[must_use]
    pub fn entry(&self) -> &NodeId {
        &self.entry
    }

    #[must_use]
    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    #[must_use]
    pub fn reducers(&self) -> &ReducerRegistry {
        &self.reducers
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Session id for the next invocation: the configured one, or a fresh
    /// generated id.
    fn next_session_id(&self) -> String {
        self.config
            .session_id
            .clone()
            .unwrap_or_else(|| IdGenerator::new().generate_run_id())
    }

    /// Runs the workflow to completion under a fresh session.
    #[instrument(skip(self, initial), err)]
    pub async fn invoke(&self, initial: StateUpdate) -> Result<WorkflowState, RunnerError> {
        let session_id = self.next_session_id();
        self.invoke_session(initial, &session_id).await
    }

    /// Runs the workflow to completion under the given session id,
    /// resuming from the latest checkpoint when the configured store has
    /// one. With the default in-memory store each invocation starts with
    /// an empty store, so resumption across invocations requires the
    /// SQLite backend or a shared [`Runner`].
    #[instrument(skip(self, initial), err)]
    pub async fn invoke_session(
        &self,
        initial: StateUpdate,
        session_id: &str,
    ) -> Result<WorkflowState, RunnerError> {
        let mut runner = Runner::new(Arc::new(self.clone())).await?;
        let init = runner.create_session(session_id, initial).await?;
        if let SessionInit::Resumed {
            checkpoint_sequence,
        } = init
        {
            tracing::info!(
                session = %session_id,
                checkpoint_sequence,
                "resuming session from checkpoint"
            );
        }
        runner.run_until_complete(session_id).await
    }

    /// Runs the workflow in the background, yielding one [`StateDelta`]
    /// per completed superstep. The returned handle cancels or joins the
    /// run; the delta stream is finite and closes when the run ends.
    pub async fn stream(&self, initial: StateUpdate) -> (InvocationHandle, DeltaStream) {
        let session_id = self.next_session_id();
        self.stream_session(initial, &session_id).await
    }

    /// Streaming variant of [`invoke_session`](Self::invoke_session).
    pub async fn stream_session(
        &self,
        initial: StateUpdate,
        session_id: &str,
    ) -> (InvocationHandle, DeltaStream) {
        let (tx, rx) = flume::unbounded();
        let cancel = CancellationToken::new();
        let workflow = Arc::new(self.clone());
        let session_id = session_id.to_string();
        let task_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            let store = workflow.config().build_store().await?;
            let event_bus = workflow.config().event_bus.build_event_bus();
            let mut runner = Runner::with_parts(workflow, store, event_bus, task_cancel);
            runner.create_session(&session_id, initial).await?;
            loop {
                let report = runner.run_step(&session_id).await?;
                if !report.ran.is_empty() || !report.new_errors.is_empty() {
                    let delta = StateDelta {
                        step: report.step,
                        changed: report.changed,
                        errors: report.new_errors,
                    };
                    // Receiver may have been dropped; the run still
                    // finishes for the checkpoint trail.
                    let _ = tx.send(delta);
                }
                if report.completed {
                    break;
                }
            }
            runner.final_state(&session_id)
        });

        (
            InvocationHandle {
                join: Some(join),
                cancel,
            },
            DeltaStream { rx },
        )
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("entry", &self.entry)
            .field("nodes", &self.registration_order)
            .field("routers", &self.routers.len())
            .finish()
    }
}

/// Handle for a streaming invocation.
///
/// [`cancel`](Self::cancel) stops scheduling further supersteps at the
/// next boundary; the last persisted checkpoint remains valid for resume.
/// Dropping the handle aborts the task outright.
pub struct InvocationHandle {
    join: Option<JoinHandle<Result<WorkflowState, RunnerError>>>,
    cancel: CancellationToken,
}

impl InvocationHandle {
    /// Request cooperative cancellation at the next superstep boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Abort the underlying task immediately.
    pub fn abort(&self) {
        if let Some(join) = &self.join {
            join.abort();
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map(|j| j.is_finished()).unwrap_or(true)
    }

    /// Await the workflow result.
    pub async fn join(mut self) -> Result<WorkflowState, RunnerError> {
        let join = self.join.take().expect("join handle already awaited");
        match join.await {
            Ok(result) => result,
            Err(err) => Err(RunnerError::Join(err)),
        }
    }
}

/// Finite stream of per-superstep deltas from a streaming invocation.
pub struct DeltaStream {
    rx: flume::Receiver<StateDelta>,
}

impl DeltaStream {
    /// Await the next delta; `None` once the run has ended.
    pub async fn recv(&self) -> Option<StateDelta> {
        self.rx.recv_async().await.ok()
    }

    /// Drain everything currently buffered without waiting.
    pub fn try_iter(&self) -> impl Iterator<Item = StateDelta> + '_ {
        self.rx.try_iter()
    }

    /// Convert into an async stream for combinator-style consumption.
    #[must_use]
    pub fn into_async_stream(self) -> BoxStream<'static, StateDelta> {
        self.rx.into_stream().boxed()
    }
}
