//! Core identifier types for the graphloom workflow engine.
//!
//! This module defines the fundamental vocabulary used when declaring a
//! graph: node identifiers, static edge targets, and the tagged routing
//! decision returned by router functions.
//!
//! # Key Types
//!
//! - [`NodeId`]: name of a registered node in a workflow graph
//! - [`EdgeTarget`]: destination of a static edge, either a node or the
//!   terminal marker
//! - [`Route`]: the decision a router function returns after inspecting the
//!   merged state
//!
//! # Examples
//!
//! ```rust
//! use graphloom::types::{EdgeTarget, NodeId, Route};
//!
//! let clean: NodeId = "clean".into();
//! assert_eq!(clean.as_str(), "clean");
//!
//! // Static edges either continue to a node or terminate the branch.
//! let next = EdgeTarget::Node("process".into());
//! let done = EdgeTarget::End;
//! assert!(matches!(done, EdgeTarget::End));
//!
//! // Routers fan out by returning several targets at once.
//! let fan_out = Route::to_all(["summarize", "classify"]);
//! assert!(matches!(fan_out, Route::ToAll(ref v) if v.len() == 2));
//! # let _ = (clean, next);
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifies a node within a workflow graph.
///
/// Node ids are plain strings chosen by the graph author. They must be
/// unique within one graph; registration order is remembered by the builder
/// and used to break ties deterministically during barrier merges.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Allows registry lookups keyed by NodeId to accept plain &str.
impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Destination of a static (unconditional) edge.
///
/// `End` is the terminal marker: a branch whose only resolved target is
/// `End` simply stops, without blocking other frontier members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EdgeTarget {
    /// Continue to the named node.
    Node(NodeId),
    /// Terminate this branch of execution.
    End,
}

impl From<NodeId> for EdgeTarget {
    fn from(id: NodeId) -> Self {
        EdgeTarget::Node(id)
    }
}

impl From<&str> for EdgeTarget {
    fn from(s: &str) -> Self {
        EdgeTarget::Node(s.into())
    }
}

/// Routing decision returned by a router function.
///
/// Routers never return bare strings; the variants make the three legal
/// outcomes explicit so the executor can validate targets against the
/// compiled node set before scheduling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// Continue to a single node.
    To(NodeId),
    /// Fan out to several nodes in one decision.
    ToAll(Vec<NodeId>),
    /// Terminate this branch.
    End,
}

impl Route {
    /// Convenience constructor for a single-target route.
    pub fn to(id: impl Into<NodeId>) -> Self {
        Route::To(id.into())
    }

    /// Convenience constructor for a fan-out route.
    pub fn to_all<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        Route::ToAll(ids.into_iter().map(Into::into).collect())
    }
}

/// Opaque identifier correlating invocations and resumptions to one
/// checkpoint lineage.
pub type SessionId = String;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display_and_borrow() {
        let id = NodeId::from("worker");
        assert_eq!(id.to_string(), "worker");
        let borrowed: &str = id.borrow();
        assert_eq!(borrowed, "worker");
    }

    #[test]
    fn route_constructors() {
        assert_eq!(Route::to("a"), Route::To("a".into()));
        assert_eq!(
            Route::to_all(["a", "b"]),
            Route::ToAll(vec!["a".into(), "b".into()])
        );
    }
}
