//! # graphloom: State-Graph Workflow Engine
//!
//! graphloom executes directed-graph workflows over a typed, shared state:
//! named nodes run concurrently in supersteps, their partial updates merge
//! deterministically through per-field reducers at a barrier, and routers
//! decide the next frontier against the merged state. Every superstep is
//! checkpointed, so sessions can resume after interruption.
//!
//! ## Core Concepts
//!
//! - **Nodes**: async units of work over immutable state snapshots
//! - **Edges**: static successors plus router functions for conditional
//!   branching, fan-out, and loops
//! - **State**: schema-declared fields with per-field merge reducers
//! - **Supersteps**: one concurrent round of node execution followed by a
//!   single barrier merge
//! - **Checkpoints**: append-only, session-keyed snapshots enabling resume
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use graphloom::graph::GraphBuilder;
//! use graphloom::node::{Node, NodeContext, NodeError};
//! use graphloom::schema::{FieldType, StateSchema};
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
//!
//! #[tokio::main]
//! async fn main() -> miette::Result<()> {
//!     let workflow = GraphBuilder::new()
//!         .with_schema(StateSchema::new().field("number", FieldType::Integer))
//!         .add_node("double", Double)
//!         .set_entry("double")
//!         .compile()?;
//!
//!     let final_state = workflow
//!         .invoke(StateUpdate::new().with("number", json!(5)))
//!         .await?;
//!     assert_eq!(final_state.get("number"), Some(&json!(10)));
//!     Ok(())
//! }
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - Node ids, edge targets, and routing decisions
//! - [`schema`] - State field declarations and type conformance
//! - [`state`] - State containers, snapshots, and partial updates
//! - [`reducers`] - Per-field merge rules applied at barriers
//! - [`node`] - The [`Node`](node::Node) trait and execution context
//! - [`graph`] - Graph definition and compilation
//! - [`workflow`] - Compiled workflows and the invoke/stream API
//! - [`runtime`] - Runner, scheduler, configuration, and checkpointing
//! - [`event_bus`] - Pluggable observability sinks
//! - [`telemetry`] - Tracing subscriber setup

pub mod event_bus;
pub mod graph;
pub mod node;
pub mod reducers;
pub mod runtime;
pub mod schema;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod util;
pub mod workflow;
