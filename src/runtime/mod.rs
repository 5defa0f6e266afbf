//! Workflow runtime: superstep execution, sessions, and checkpointing.
//!
//! The runtime layer turns a compiled [`Workflow`](crate::workflow::Workflow)
//! into running sessions. [`Runner`] executes supersteps and persists a
//! [`Checkpoint`] after each one; [`CheckpointStore`] abstracts over the
//! in-memory and SQLite backends; [`RunConfig`] carries the knobs
//! (superstep ceiling, failure policy, timeouts, concurrency, sinks).
//!
//! # Usage
//!
//! ```rust,no_run
//! use graphloom::runtime::Runner;
//! use graphloom::state::StateUpdate;
//! use std::sync::Arc;
//! # async fn example(workflow: graphloom::workflow::Workflow) -> Result<(), graphloom::runtime::RunnerError> {
//! let mut runner = Runner::new(Arc::new(workflow)).await?;
//! runner.create_session("session-1", StateUpdate::new()).await?;
//! let final_state = runner.run_until_complete("session-1").await?;
//! # let _ = final_state;
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
#[cfg(feature = "sqlite")]
pub mod checkpoint_sqlite;
pub mod config;
pub mod persistence;
pub mod runner;
pub mod scheduler;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore, InMemoryStore};
#[cfg(feature = "sqlite")]
pub use checkpoint_sqlite::SqliteStore;
pub use config::{ErrorPolicy, EventBusConfig, RunConfig, SinkConfig, StoreKind};
pub use persistence::{PersistedCheckpoint, PersistedState, PersistenceError};
pub use runner::{Runner, RunnerError, SessionInit, SessionState, StepReport};
pub use scheduler::{NodeFailure, Scheduler, SuperstepOutput};
