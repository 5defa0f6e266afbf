#![allow(dead_code)]

pub mod nodes;

use graphloom::runtime::{EventBusConfig, RunConfig};

/// Configuration used across integration tests: no stdout sink noise.
pub fn quiet_config() -> RunConfig {
    graphloom::telemetry::init_tracing();
    RunConfig::new().with_event_bus(EventBusConfig::silent())
}
