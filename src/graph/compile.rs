use miette::Diagnostic;
use thiserror::Error;

use crate::schema::FieldType;
use crate::types::{EdgeTarget, NodeId};
use crate::workflow::Workflow;

/// Structural problems detected at compile time.
///
/// Always surfaced to the caller, never retried. Router target names are
/// not statically checkable and surface at runtime instead.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphValidationError {
    #[error("entry point is not set")]
    #[diagnostic(
        code(graphloom::graph::missing_entry),
        help("Call set_entry with the node that should start execution.")
    )]
    MissingEntry,

    #[error("entry point `{0}` is not a registered node")]
    #[diagnostic(code(graphloom::graph::unknown_entry))]
    UnknownEntry(NodeId),

    #[error("edge source `{0}` is not a registered node")]
    #[diagnostic(code(graphloom::graph::unknown_edge_source))]
    UnknownEdgeSource(NodeId),

    #[error("edge target `{0}` is not a registered node")]
    #[diagnostic(code(graphloom::graph::unknown_edge_target))]
    UnknownEdgeTarget(NodeId),

    #[error("router source `{0}` is not a registered node")]
    #[diagnostic(code(graphloom::graph::unknown_router_source))]
    UnknownRouterSource(NodeId),

    #[error("default for field `{field}` does not conform to {expected}")]
    #[diagnostic(code(graphloom::graph::default_mismatch))]
    DefaultMismatch {
        field: String,
        expected: FieldType,
    },
}

impl super::builder::GraphBuilder {
    /// Validates the definition and produces an executable [`Workflow`].
    ///
    /// Compilation is side-effect free and repeatable; it performs no
    /// execution. It fails when the entry point is unset or unknown, or
    /// when any edge endpoint or router source names an unregistered node.
    /// A node with neither outgoing edges nor a router is reported at
    /// `warn` level only: reaching it simply ends that branch, and dynamic
    /// routing makes true dead-end detection undecidable.
    pub fn compile(self) -> Result<Workflow, GraphValidationError> {
        let entry = self.entry.clone().ok_or(GraphValidationError::MissingEntry)?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphValidationError::UnknownEntry(entry));
        }

        for spec in self.schema.iter() {
            if !spec.field_type.admits(&spec.default) {
                return Err(GraphValidationError::DefaultMismatch {
                    field: spec.name.clone(),
                    expected: spec.field_type,
                });
            }
        }

        for (from, targets) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphValidationError::UnknownEdgeSource(from.clone()));
            }
            for target in targets {
                if let EdgeTarget::Node(to) = target {
                    if !self.nodes.contains_key(to) {
                        return Err(GraphValidationError::UnknownEdgeTarget(to.clone()));
                    }
                }
            }
        }

        for router in &self.routers {
            if !self.nodes.contains_key(router.from()) {
                return Err(GraphValidationError::UnknownRouterSource(
                    router.from().clone(),
                ));
            }
        }

        for id in &self.registration_order {
            let has_static = self.edges.get(id).map(|e| !e.is_empty()).unwrap_or(false);
            let has_router = self.routers.iter().any(|r| r.from() == id);
            if !has_static && !has_router {
                tracing::warn!(
                    node = %id,
                    "node has no outgoing edge or router; reaching it ends that branch"
                );
            }
        }

        Ok(Workflow::from_parts(
            self.nodes,
            self.registration_order,
            self.edges,
            self.routers,
            entry,
            self.schema,
            self.reducers,
            self.config,
        ))
    }
}
