use async_trait::async_trait;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

use graphloom::graph::GraphBuilder;
use graphloom::node::{Node, NodeContext, NodeError};
use graphloom::runtime::{EventBusConfig, RunConfig};
use graphloom::state::{StateSnapshot, StateUpdate};
use graphloom::types::EdgeTarget;

struct BenchNode;

#[async_trait]
impl Node for BenchNode {
    async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<StateUpdate, NodeError> {
        Ok(StateUpdate::new())
    }
}

fn chain_builder(len: usize) -> GraphBuilder {
    let mut builder = GraphBuilder::new()
        .with_config(RunConfig::new().with_event_bus(EventBusConfig::silent()))
        .add_node("n0", BenchNode)
        .set_entry("n0");
    for i in 1..len {
        let name = format!("n{i}");
        builder = builder
            .add_node(name.as_str(), BenchNode)
            .add_edge(format!("n{}", i - 1).as_str(), name.as_str());
    }
    builder.add_edge(format!("n{}", len - 1).as_str(), EdgeTarget::End)
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_chain_64", |b| {
        b.iter_batched(
            || chain_builder(64),
            |builder| builder.compile().expect("chain compiles"),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("compile_chain_512", |b| {
        b.iter_batched(
            || chain_builder(512),
            |builder| builder.compile().expect("chain compiles"),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
