//! Graph definition and compilation.
//!
//! A workflow graph is declared with [`GraphBuilder`]: register nodes, wire
//! static edges and router functions, pick the entry point, and declare the
//! state schema and reducers. [`GraphBuilder::compile`] validates the
//! definition and produces an immutable, executable
//! [`Workflow`](crate::workflow::Workflow).
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use graphloom::graph::GraphBuilder;
//! use graphloom::node::{Node, NodeContext, NodeError};
//! use graphloom::schema::{FieldType, StateSchema};
//! use graphloom::state::{StateSnapshot, StateUpdate};
//! use async_trait::async_trait;
//! use serde_json::json;
//!
//! struct Greet;
//!
//! #[async_trait]
//! impl Node for Greet {
//!     async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<StateUpdate, NodeError> {
//!         Ok(StateUpdate::new().with("greeting", json!("hello")))
//!     }
//! }
//!
//! # fn main() -> Result<(), graphloom::graph::GraphValidationError> {
//! let workflow = GraphBuilder::new()
//!     .with_schema(StateSchema::new().field("greeting", FieldType::Text))
//!     .add_node("greet", Greet)
//!     .set_entry("greet")
//!     .compile()?;
//! # Ok(())
//! # }
//! ```
//!
//! Routers replace string-typed "return the next node name" conventions
//! with an explicit [`Route`](crate::types::Route) value checked against
//! the compiled node set before scheduling:
//!
//! ```rust,no_run
//! use graphloom::graph::RouterFn;
//! use graphloom::types::Route;
//! use std::sync::Arc;
//!
//! let bounded_retry: RouterFn = Arc::new(|snapshot| {
//!     if snapshot.integer("attempt").unwrap_or(0) >= 3 {
//!         Route::End
//!     } else {
//!         Route::to("try_operation")
//!     }
//! });
//! ```

mod builder;
mod compile;
mod edges;

pub use builder::GraphBuilder;
pub use compile::GraphValidationError;
pub use edges::{RouterEdge, RouterFn};
