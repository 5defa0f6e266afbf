//! Node execution primitives.
//!
//! A node is a named, async unit of work: it receives an immutable
//! [`StateSnapshot`] plus a [`NodeContext`] and returns the partial
//! [`StateUpdate`] it wants merged at the superstep barrier. Nodes never
//! mutate state in place and never observe a sibling's output within the
//! same superstep.
//!
//! # Examples
//!
//! ```rust
//! use async_trait::async_trait;
//! use graphloom::node::{Node, NodeContext, NodeError};
//! use graphloom::state::{StateSnapshot, StateUpdate};
//! use serde_json::json;
//!
//! struct Double;
//!
//! #[async_trait]
//! impl Node for Double {
//!     async fn run(
//!         &self,
//!         snapshot: StateSnapshot,
//!         _ctx: NodeContext,
//!     ) -> Result<StateUpdate, NodeError> {
//!         let n = snapshot
//!             .integer("number")
//!             .ok_or(NodeError::MissingField { what: "number" })?;
//!         Ok(StateUpdate::new().with("number", json!(n * 2)))
//!     }
//! }
//! ```

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::event_bus::Event;
use crate::state::{StateSnapshot, StateUpdate};
use crate::types::NodeId;

/// A unit of work over workflow state.
///
/// Implementations should be stateless and deterministic where possible;
/// any external effects (model calls, tool execution) are treated as black
/// boxes that eventually return a value or an error.
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute against the pre-superstep snapshot, returning a partial
    /// update. Returning `Err` fails the node; the configured failure
    /// policy decides whether that aborts the whole invocation.
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<StateUpdate, NodeError>;
}

/// Per-execution context handed to a node.
///
/// Carries the node's identity, the current superstep number, and a handle
/// for emitting observability events.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Identifier of the executing node.
    pub node_id: NodeId,
    /// Superstep number this execution belongs to.
    pub step: u64,
    /// Channel into the runner's event bus.
    pub event_sender: flume::Sender<Event>,
}

impl NodeContext {
    /// Emit a node-scoped event enriched with this context's metadata.
    pub fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), NodeContextError> {
        self.event_sender
            .send(Event::node(
                self.node_id.clone(),
                self.step,
                scope,
                message,
            ))
            .map_err(|_| NodeContextError::EventBusUnavailable)
    }
}

/// Errors from [`NodeContext`] operations.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeContextError {
    #[error("failed to emit event: event bus unavailable")]
    #[diagnostic(
        code(graphloom::node::event_bus_unavailable),
        help("The event bus may already be shut down for this run.")
    )]
    EventBusUnavailable,
}

/// Fatal errors raised inside a node.
///
/// Under the fail-fast policy any of these aborts the invocation, leaving
/// the last good checkpoint available for resume. Under best-effort the
/// failure is recorded on the state's error lane and siblings still merge.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// An expected field was missing or had an unusable shape.
    #[error("missing expected field: {what}")]
    #[diagnostic(
        code(graphloom::node::missing_field),
        help("Check that an earlier node produced the required field.")
    )]
    MissingField { what: &'static str },

    /// External provider or service error.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(graphloom::node::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// JSON serialization error while shaping the update.
    #[error(transparent)]
    #[diagnostic(code(graphloom::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Input validation failed.
    #[error("validation failed: {0}")]
    #[diagnostic(code(graphloom::node::validation))]
    ValidationFailed(String),

    /// Event bus communication error.
    #[error("event bus error: {0}")]
    #[diagnostic(code(graphloom::node::event_bus))]
    EventBus(#[from] NodeContextError),
}
