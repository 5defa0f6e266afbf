//! Lightweight event bus for workflow observability.
//!
//! Nodes and the runner emit [`Event`]s through a shared channel; a
//! background listener broadcasts them to every configured [`EventSink`].
//! Sinks are pluggable so the same run can log to stdout, capture events
//! in memory for tests, and stream them to an async consumer at once.

mod bus;
mod event;
mod sink;

pub use bus::EventBus;
pub use event::{DiagnosticEvent, Event, NodeEvent};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
