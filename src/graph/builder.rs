use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::edges::{RouterEdge, RouterFn};
use crate::node::Node;
use crate::reducers::{Reducer, ReducerRegistry};
use crate::runtime::RunConfig;
use crate::schema::StateSchema;
use crate::types::{EdgeTarget, NodeId};

/// Fluent builder for workflow graphs.
///
/// Collects nodes, edges, routers, the entry point, the state schema, and
/// per-field reducers, then validates everything in
/// [`compile`](Self::compile). Node registration order is recorded and
/// later used as the deterministic tie-break order for barrier merges.
///
/// # Examples
///
/// Fan-out and fan-in through static edges:
///
/// ```rust,no_run
/// use graphloom::graph::GraphBuilder;
/// use graphloom::reducers::AppendList;
/// use graphloom::schema::{FieldType, StateSchema};
/// # use graphloom::node::{Node, NodeContext, NodeError};
/// # use graphloom::state::{StateSnapshot, StateUpdate};
/// # struct Work;
/// # #[async_trait::async_trait]
/// # impl Node for Work {
/// #     async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<StateUpdate, NodeError> {
/// #         Ok(StateUpdate::new())
/// #     }
/// # }
///
/// # fn main() -> Result<(), graphloom::graph::GraphValidationError> {
/// let workflow = GraphBuilder::new()
///     .with_schema(StateSchema::new().field("results", FieldType::List))
///     .with_reducer("results", AppendList)
///     .add_node("seed", Work)
///     .add_node("worker_a", Work)
///     .add_node("worker_b", Work)
///     .add_node("combine", Work)
///     .set_entry("seed")
///     .add_edge("seed", "worker_a")
///     .add_edge("seed", "worker_b")
///     .add_edge("worker_a", "combine")
///     .add_edge("worker_b", "combine")
///     .compile()?;
/// # Ok(())
/// # }
/// ```
pub struct GraphBuilder {
    pub(crate) nodes: FxHashMap<NodeId, Arc<dyn Node>>,
    pub(crate) registration_order: Vec<NodeId>,
    pub(crate) edges: FxHashMap<NodeId, Vec<EdgeTarget>>,
    pub(crate) routers: Vec<RouterEdge>,
    pub(crate) entry: Option<NodeId>,
    pub(crate) schema: StateSchema,
    pub(crate) reducers: ReducerRegistry,
    pub(crate) config: RunConfig,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            registration_order: Vec::new(),
            edges: FxHashMap::default(),
            routers: Vec::new(),
            entry: None,
            schema: StateSchema::default(),
            reducers: ReducerRegistry::default(),
            config: RunConfig::default(),
        }
    }

    /// Registers a node under the given id.
    ///
    /// Re-registering an id replaces the implementation but keeps the
    /// original registration position.
    #[must_use]
    pub fn add_node(mut self, id: impl Into<NodeId>, node: impl Node + 'static) -> Self {
        let id = id.into();
        if self.nodes.insert(id.clone(), Arc::new(node)).is_some() {
            tracing::warn!(node = %id, "node re-registered; replacing implementation");
        } else {
            self.registration_order.push(id);
        }
        self
    }

    /// Adds a static edge.
    ///
    /// Multiple edges from the same node fan out; multiple edges onto the
    /// same node fan in. `EdgeTarget::End` terminates the branch.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<NodeId>, to: impl Into<EdgeTarget>) -> Self {
        self.edges.entry(from.into()).or_default().push(to.into());
        self
    }

    /// Adds a conditional edge driven by a router function.
    ///
    /// All routers attached to a node are evaluated against the merged
    /// state after each superstep the node ran in; their targets are
    /// combined with the node's static edges.
    #[must_use]
    pub fn add_router(mut self, from: impl Into<NodeId>, router: RouterFn) -> Self {
        self.routers.push(RouterEdge::new(from, router));
        self
    }

    /// Declares the entry point. Required; compilation fails without one.
    #[must_use]
    pub fn set_entry(mut self, entry: impl Into<NodeId>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    /// Declares the state schema.
    #[must_use]
    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Registers a merge reducer for one field.
    #[must_use]
    pub fn with_reducer(mut self, field: impl Into<String>, reducer: impl Reducer + 'static) -> Self {
        self.reducers.register(field, Arc::new(reducer));
        self
    }

    /// Replaces the whole reducer registry.
    #[must_use]
    pub fn with_reducers(mut self, reducers: ReducerRegistry) -> Self {
        self.reducers = reducers;
        self
    }

    /// Overrides the runtime configuration compiled into the workflow.
    #[must_use]
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }
}
