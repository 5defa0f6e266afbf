use std::sync::Arc;

use crate::state::StateSnapshot;
use crate::types::{NodeId, Route};

/// Router function for conditional edges.
///
/// Evaluated against the merged post-superstep state of its source node's
/// superstep; returns the [`Route`] deciding which nodes join the next
/// frontier. Unknown target names surface as a routing error at runtime
/// since they cannot be checked statically.
pub type RouterFn = Arc<dyn Fn(&StateSnapshot) -> Route + Send + Sync + 'static>;

/// A conditional edge: source node plus router function.
#[derive(Clone)]
pub struct RouterEdge {
    from: NodeId,
    router: RouterFn,
}

impl RouterEdge {
    pub fn new(from: impl Into<NodeId>, router: RouterFn) -> Self {
        Self {
            from: from.into(),
            router,
        }
    }

    #[must_use]
    pub fn from(&self) -> &NodeId {
        &self.from
    }

    #[must_use]
    pub fn router(&self) -> &RouterFn {
        &self.router
    }
}

impl std::fmt::Debug for RouterEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterEdge").field("from", &self.from).finish()
    }
}
