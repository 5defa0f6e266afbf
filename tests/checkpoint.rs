use std::sync::Arc;

use graphloom::event_bus::EventBus;
use graphloom::graph::GraphBuilder;
use graphloom::runtime::runner::{Runner, SessionInit, SessionState};
use graphloom::runtime::{Checkpoint, CheckpointError, CheckpointStore, InMemoryStore};
use graphloom::schema::{FieldType, StateSchema};
use graphloom::state::StateUpdate;
use graphloom::workflow::Workflow;
use serde_json::json;
use tokio_util::sync::CancellationToken;

mod common;
use common::nodes::{CleanText, FormatText, ProcessText};
use common::quiet_config;

fn checkpoint_at(session_id: &str, sequence: u64) -> Checkpoint {
    let schema = StateSchema::new().field("n", FieldType::Integer);
    let session = SessionState {
        state: graphloom::state::WorkflowState::from(graphloom::runtime::PersistedState {
            fields: schema.default_state(),
            revision: 1,
            errors: Vec::new(),
        }),
        step: sequence,
        frontier: vec!["next".into()],
    };
    Checkpoint::from_session(session_id, &session)
}

fn pipeline_workflow() -> Workflow {
    let schema = StateSchema::new()
        .field("text", FieldType::Text)
        .field("cleaned", FieldType::Text)
        .field("processed", FieldType::Text)
        .field("output", FieldType::Text);
    GraphBuilder::new()
        .with_config(quiet_config())
        .with_schema(schema)
        .add_node("clean", CleanText)
        .add_node("process", ProcessText)
        .add_node("format", FormatText)
        .set_entry("clean")
        .add_edge("clean", "process")
        .add_edge("process", "format")
        .compile()
        .unwrap()
}

fn runner_with(workflow: Workflow, store: Arc<InMemoryStore>) -> Runner {
    Runner::with_parts(
        Arc::new(workflow),
        store,
        EventBus::with_sinks(Vec::new()),
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn put_then_get_latest_round_trips_state() {
    let store = InMemoryStore::new();
    let cp = checkpoint_at("sess", 1);
    store.put(cp.clone()).await.unwrap();

    let loaded = store.get_latest("sess").await.unwrap().unwrap();
    assert_eq!(loaded.sequence, 1);
    assert_eq!(loaded.state.fields(), cp.state.fields());
    assert_eq!(loaded.frontier, cp.frontier);
}

#[tokio::test]
async fn list_returns_checkpoints_oldest_first() {
    let store = InMemoryStore::new();
    for sequence in 1..=3 {
        store.put(checkpoint_at("sess", sequence)).await.unwrap();
    }
    let listed = store.list("sess").await.unwrap();
    let sequences: Vec<_> = listed.iter().map(|cp| cp.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[tokio::test]
async fn out_of_order_put_is_a_conflict() {
    let store = InMemoryStore::new();
    store.put(checkpoint_at("sess", 5)).await.unwrap();

    let same = store.put(checkpoint_at("sess", 5)).await.unwrap_err();
    assert!(matches!(same, CheckpointError::Conflict { sequence: 5, .. }));

    let behind = store.put(checkpoint_at("sess", 3)).await.unwrap_err();
    assert!(matches!(behind, CheckpointError::Conflict { sequence: 3, .. }));

    // The lineage is untouched by failed writes.
    assert_eq!(store.list("sess").await.unwrap().len(), 1);
}

#[tokio::test]
async fn sessions_have_independent_lineages() {
    let store = InMemoryStore::new();
    store.put(checkpoint_at("alpha", 1)).await.unwrap();
    store.put(checkpoint_at("beta", 1)).await.unwrap();
    store.put(checkpoint_at("alpha", 2)).await.unwrap();

    let mut sessions = store.list_sessions().await.unwrap();
    sessions.sort();
    assert_eq!(sessions, vec!["alpha", "beta"]);
    assert_eq!(store.get_latest("alpha").await.unwrap().unwrap().sequence, 2);
    assert_eq!(store.get_latest("beta").await.unwrap().unwrap().sequence, 1);
}

#[tokio::test]
async fn get_latest_for_unknown_session_is_none() {
    let store = InMemoryStore::new();
    assert!(store.get_latest("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn resume_reproduces_the_uninterrupted_final_state() {
    let initial = || StateUpdate::new().with("text", json!("  Hello World  "));

    // Uninterrupted reference run.
    let store = Arc::new(InMemoryStore::new());
    let mut reference = runner_with(pipeline_workflow(), store);
    reference.create_session("ref", initial()).await.unwrap();
    let expected = reference.run_until_complete("ref").await.unwrap();

    // Interrupted run: one superstep, then the runner goes away.
    let store = Arc::new(InMemoryStore::new());
    {
        let mut first = runner_with(pipeline_workflow(), store.clone());
        first.create_session("s", initial()).await.unwrap();
        first.run_step("s").await.unwrap();
    }

    // Resume with a no-op initial state against the same store.
    let mut second = runner_with(pipeline_workflow(), store.clone());
    let init = second
        .create_session("s", StateUpdate::new())
        .await
        .unwrap();
    assert_eq!(
        init,
        SessionInit::Resumed {
            checkpoint_sequence: 1
        }
    );
    let resumed = second.run_until_complete("s").await.unwrap();

    assert_eq!(resumed.fields(), expected.fields());
    assert_eq!(
        resumed.get("output"),
        Some(&json!("Result: HELLO WORLD (from: hello world)"))
    );
}

#[tokio::test]
async fn every_superstep_is_checkpointed_in_order() {
    let store = Arc::new(InMemoryStore::new());
    let mut runner = runner_with(pipeline_workflow(), store.clone());
    runner
        .create_session("trail", StateUpdate::new().with("text", json!("x")))
        .await
        .unwrap();
    runner.run_until_complete("trail").await.unwrap();

    let trail = store.list("trail").await.unwrap();
    let sequences: Vec<_> = trail.iter().map(|cp| cp.sequence).collect();
    // Initial checkpoint plus one per superstep of the 3-node pipeline.
    assert_eq!(sequences, vec![0, 1, 2, 3]);
    assert!(trail.last().unwrap().frontier.is_empty());
}
