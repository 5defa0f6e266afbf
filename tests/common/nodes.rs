//! Shared node implementations for integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use graphloom::node::{Node, NodeContext, NodeError};
use graphloom::state::{StateSnapshot, StateUpdate};
use serde_json::json;

/// Runs successfully without touching the state.
pub struct PassThrough;

#[async_trait]
impl Node for PassThrough {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<StateUpdate, NodeError> {
        Ok(StateUpdate::new())
    }
}

/// Doubles the integer field `number`.
pub struct DoubleNumber;

#[async_trait]
impl Node for DoubleNumber {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _: NodeContext,
    ) -> Result<StateUpdate, NodeError> {
        let n = snapshot
            .integer("number")
            .ok_or(NodeError::MissingField { what: "number" })?;
        Ok(StateUpdate::new().with("number", json!(n * 2)))
    }
}

/// Trims and lowercases `text` into `cleaned`.
pub struct CleanText;

#[async_trait]
impl Node for CleanText {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _: NodeContext,
    ) -> Result<StateUpdate, NodeError> {
        let text = snapshot
            .text("text")
            .ok_or(NodeError::MissingField { what: "text" })?;
        Ok(StateUpdate::new().with("cleaned", json!(text.trim().to_lowercase())))
    }
}

/// Uppercases `cleaned` into `processed`.
pub struct ProcessText;

#[async_trait]
impl Node for ProcessText {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _: NodeContext,
    ) -> Result<StateUpdate, NodeError> {
        let cleaned = snapshot
            .text("cleaned")
            .ok_or(NodeError::MissingField { what: "cleaned" })?;
        Ok(StateUpdate::new().with("processed", json!(cleaned.to_uppercase())))
    }
}

/// Renders the final `output` from `processed` and `cleaned`.
pub struct FormatText;

#[async_trait]
impl Node for FormatText {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _: NodeContext,
    ) -> Result<StateUpdate, NodeError> {
        let processed = snapshot
            .text("processed")
            .ok_or(NodeError::MissingField { what: "processed" })?;
        let cleaned = snapshot
            .text("cleaned")
            .ok_or(NodeError::MissingField { what: "cleaned" })?;
        Ok(StateUpdate::new().with("output", json!(format!("Result: {processed} (from: {cleaned})"))))
    }
}

/// Appends one entry to the list field `results`.
pub struct AppendValue {
    pub value: &'static str,
}

#[async_trait]
impl Node for AppendValue {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<StateUpdate, NodeError> {
        Ok(StateUpdate::new().with("results", json!([self.value])))
    }
}

/// Joins the sorted `results` entries into `combined`.
pub struct CombineResults;

#[async_trait]
impl Node for CombineResults {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _: NodeContext,
    ) -> Result<StateUpdate, NodeError> {
        let results = snapshot
            .list("results")
            .ok_or(NodeError::MissingField { what: "results" })?;
        let mut entries: Vec<String> = results
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        entries.sort();
        Ok(StateUpdate::new().with("combined", json!(entries.join("+"))))
    }
}

/// Increments the integer field `counter` by one.
pub struct IncrementCounter;

#[async_trait]
impl Node for IncrementCounter {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _: NodeContext,
    ) -> Result<StateUpdate, NodeError> {
        let counter = snapshot.integer("counter").unwrap_or(0);
        Ok(StateUpdate::new().with("counter", json!(counter + 1)))
    }
}

/// Records one more failed attempt in `attempt`.
pub struct FailingOperation;

#[async_trait]
impl Node for FailingOperation {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<StateUpdate, NodeError> {
        let attempt = snapshot.integer("attempt").unwrap_or(0) + 1;
        ctx.emit("retry", format!("attempt {attempt} failed"))?;
        Ok(StateUpdate::new()
            .with("attempt", json!(attempt))
            .with("succeeded", json!(false)))
    }
}

/// Always fails with a validation error.
pub struct AlwaysFails;

#[async_trait]
impl Node for AlwaysFails {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<StateUpdate, NodeError> {
        Err(NodeError::ValidationFailed("always fails".into()))
    }
}

/// Sleeps before writing `slow_done`, for timeout and cancellation tests.
pub struct SlowNode {
    pub delay: Duration,
}

#[async_trait]
impl Node for SlowNode {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<StateUpdate, NodeError> {
        tokio::time::sleep(self.delay).await;
        Ok(StateUpdate::new().with("slow_done", json!(true)))
    }
}

/// Counts how many times it executed, for fan-in assertions.
pub struct ExecutionCounter {
    pub hits: Arc<AtomicUsize>,
}

#[async_trait]
impl Node for ExecutionCounter {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<StateUpdate, NodeError> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        Ok(StateUpdate::new())
    }
}

/// Contributes a fixed amount to the reduced field `total`.
pub struct Contribute {
    pub amount: i64,
}

#[async_trait]
impl Node for Contribute {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<StateUpdate, NodeError> {
        Ok(StateUpdate::new().with("total", json!(self.amount)))
    }
}

/// Writes a fixed value into an arbitrary field.
pub struct WriteField {
    pub field: &'static str,
    pub value: serde_json::Value,
}

#[async_trait]
impl Node for WriteField {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<StateUpdate, NodeError> {
        Ok(StateUpdate::new().with(self.field, self.value.clone()))
    }
}
