use std::sync::Arc;
use std::time::Duration;

use graphloom::event_bus::{ChannelSink, Event, EventBus, MemorySink};
use graphloom::graph::{GraphBuilder, RouterFn};
use graphloom::runtime::runner::Runner;
use graphloom::runtime::InMemoryStore;
use graphloom::schema::{FieldType, StateSchema};
use graphloom::state::StateUpdate;
use graphloom::types::Route;
use serde_json::json;
use tokio_util::sync::CancellationToken;

mod common;
use common::nodes::FailingOperation;
use common::quiet_config;

fn retry_workflow() -> graphloom::workflow::Workflow {
    let exit_after_two: RouterFn = Arc::new(|snapshot| {
        if snapshot.integer("attempt").unwrap_or(0) >= 2 {
            Route::End
        } else {
            Route::to("try_operation")
        }
    });
    let schema = StateSchema::new()
        .field("attempt", FieldType::Integer)
        .field_with_default("succeeded", FieldType::Bool, json!(false));
    GraphBuilder::new()
        .with_config(quiet_config())
        .with_schema(schema)
        .add_node("try_operation", FailingOperation)
        .set_entry("try_operation")
        .add_router("try_operation", exit_after_two)
        .compile()
        .unwrap()
}

#[tokio::test]
async fn node_emits_reach_the_memory_sink() {
    let sink = MemorySink::new();
    let bus = EventBus::with_sink(sink.clone());

    let mut runner = Runner::with_parts(
        Arc::new(retry_workflow()),
        Arc::new(InMemoryStore::new()),
        bus,
        CancellationToken::new(),
    );
    runner
        .create_session("events", StateUpdate::new())
        .await
        .unwrap();
    runner.run_until_complete("events").await.unwrap();
    runner.event_bus().shutdown().await;

    let events = sink.snapshot();
    let retry_events: Vec<_> = events
        .iter()
        .filter(|e| e.scope() == "retry")
        .collect();
    assert_eq!(retry_events.len(), 2);
    assert!(retry_events[0].message().contains("attempt 1"));
    match retry_events[0] {
        Event::Node(node_event) => {
            assert_eq!(node_event.node, "try_operation");
            assert_eq!(node_event.step, 1);
        }
        other => panic!("expected node event, got {other:?}"),
    }
}

#[tokio::test]
async fn channel_sink_streams_events_to_async_consumers() {
    let (tx, rx) = flume::unbounded();
    let bus = EventBus::with_sink(ChannelSink::new(tx));

    let mut runner = Runner::with_parts(
        Arc::new(retry_workflow()),
        Arc::new(InMemoryStore::new()),
        bus,
        CancellationToken::new(),
    );
    runner
        .create_session("stream", StateUpdate::new())
        .await
        .unwrap();
    runner.run_until_complete("stream").await.unwrap();
    runner.event_bus().shutdown().await;

    let mut node_events = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, Event::Node(_)) {
            node_events += 1;
        }
    }
    assert_eq!(node_events, 2);
}

#[tokio::test]
async fn listener_shutdown_is_idempotent() {
    let bus = EventBus::with_sink(MemorySink::new());
    bus.listen();
    bus.listen();
    let sender = bus.sender();
    sender
        .send(Event::diagnostic("test", "hello"))
        .expect("send");
    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.shutdown().await;
    bus.shutdown().await;
}
