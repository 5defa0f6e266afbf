use std::time::Duration;

use graphloom::graph::GraphBuilder;
use graphloom::runtime::RunnerError;
use graphloom::schema::{FieldType, StateSchema};
use graphloom::state::StateUpdate;
use serde_json::json;

mod common;
use common::nodes::{CleanText, FormatText, ProcessText, SlowNode};
use common::quiet_config;

#[tokio::test]
async fn stream_yields_one_delta_per_superstep() {
    let schema = StateSchema::new()
        .field("text", FieldType::Text)
        .field("cleaned", FieldType::Text)
        .field("processed", FieldType::Text)
        .field("output", FieldType::Text);
    let workflow = GraphBuilder::new()
        .with_config(quiet_config())
        .with_schema(schema)
        .add_node("clean", CleanText)
        .add_node("process", ProcessText)
        .add_node("format", FormatText)
        .set_entry("clean")
        .add_edge("clean", "process")
        .add_edge("process", "format")
        .compile()
        .unwrap();

    let (handle, deltas) = workflow
        .stream(StateUpdate::new().with("text", json!("  Hello World  ")))
        .await;

    let mut received = Vec::new();
    while let Some(delta) = deltas.recv().await {
        received.push(delta);
    }
    let final_state = handle.join().await.unwrap();

    assert_eq!(received.len(), 3);
    assert_eq!(received[0].step, 1);
    assert_eq!(received[0].changed.get("cleaned"), Some(&json!("hello world")));
    assert_eq!(
        received[1].changed.get("processed"),
        Some(&json!("HELLO WORLD"))
    );
    assert_eq!(
        received[2].changed.get("output"),
        Some(&json!("Result: HELLO WORLD (from: hello world)"))
    );
    assert_eq!(
        final_state.get("output"),
        Some(&json!("Result: HELLO WORLD (from: hello world)"))
    );
}

#[tokio::test]
async fn stream_is_finite_and_closes_after_completion() {
    let workflow = GraphBuilder::new()
        .with_config(quiet_config())
        .with_schema(StateSchema::new().field("slow_done", FieldType::Bool))
        .add_node(
            "slow",
            SlowNode {
                delay: Duration::from_millis(5),
            },
        )
        .set_entry("slow")
        .compile()
        .unwrap();

    let (handle, deltas) = workflow.stream(StateUpdate::new()).await;
    handle.join().await.unwrap();

    // Everything is buffered; the channel then reports closure.
    let collected: Vec<_> = deltas.try_iter().collect();
    assert_eq!(collected.len(), 1);
    assert!(deltas.recv().await.is_none());
}

#[tokio::test]
async fn cancelling_a_streaming_run_stops_further_supersteps() {
    let workflow = GraphBuilder::new()
        .with_config(quiet_config().with_max_supersteps(10_000))
        .with_schema(StateSchema::new().field("slow_done", FieldType::Bool))
        .add_node(
            "spin",
            SlowNode {
                delay: Duration::from_millis(5),
            },
        )
        .set_entry("spin")
        .add_edge("spin", "spin")
        .compile()
        .unwrap();

    let (handle, deltas) = workflow.stream(StateUpdate::new()).await;
    // Wait until the run demonstrably made progress, then cancel.
    let first = deltas.recv().await;
    assert!(first.is_some());
    handle.cancel();

    let err = handle.join().await.unwrap_err();
    assert!(matches!(err, RunnerError::Cancelled { .. }));
}

#[tokio::test]
async fn deltas_compose_with_async_stream_combinators() {
    use futures_util::StreamExt;

    let workflow = GraphBuilder::new()
        .with_config(quiet_config())
        .with_schema(StateSchema::new().field("slow_done", FieldType::Bool))
        .add_node(
            "slow",
            SlowNode {
                delay: Duration::from_millis(5),
            },
        )
        .set_entry("slow")
        .compile()
        .unwrap();

    let (handle, deltas) = workflow.stream(StateUpdate::new()).await;
    let steps: Vec<u64> = deltas
        .into_async_stream()
        .map(|delta| delta.step)
        .collect()
        .await;
    handle.join().await.unwrap();
    assert_eq!(steps, vec![1]);
}
