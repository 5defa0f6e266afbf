use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// A structured observability event emitted during workflow execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Emitted by a node through its context.
    Node(NodeEvent),
    /// Emitted by the runner itself.
    Diagnostic(DiagnosticEvent),
}

impl Event {
    pub fn node(
        node_id: NodeId,
        step: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Node(NodeEvent {
            node: node_id.to_string(),
            step,
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        match self {
            Event::Node(e) => &e.scope,
            Event::Diagnostic(e) => &e.scope,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Event::Node(e) => &e.message,
            Event::Diagnostic(e) => &e.message,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Node(e) => write!(
                f,
                "[node:{} step:{}] {}: {}",
                e.node, e.step, e.scope, e.message
            ),
            Event::Diagnostic(e) => write!(f, "[diagnostic] {}: {}", e.scope, e.message),
        }
    }
}

/// Event scoped to one node execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEvent {
    pub node: String,
    pub step: u64,
    pub scope: String,
    pub message: String,
}

/// Event scoped to the run as a whole.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub scope: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_node_metadata() {
        let event = Event::node("clean".into(), 2, "progress", "trimmed input");
        let rendered = event.to_string();
        assert!(rendered.contains("clean"));
        assert!(rendered.contains("step:2"));
        assert!(rendered.contains("trimmed input"));
    }
}
