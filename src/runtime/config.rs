use std::sync::Arc;
use std::time::Duration;

use crate::event_bus::{EventBus, MemorySink, StdOutSink};
use crate::runtime::checkpoint::{CheckpointError, CheckpointStore, InMemoryStore};

/// How a node failure affects the rest of the invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Abort the whole invocation; the checkpoint of the last good
    /// superstep remains available for resume.
    #[default]
    FailFast,
    /// Record the failure on the state's error lane, drop the failing
    /// node's contribution, and keep merging its siblings.
    BestEffort,
}

/// Checkpoint backend selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StoreKind {
    /// Volatile in-process store; checkpoints live as long as the runner.
    #[default]
    InMemory,
    /// Durable SQLite-backed store.
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// Runtime configuration compiled into a workflow.
///
/// Everything has a sensible default: fail-fast error handling, a
/// 64-superstep ceiling, no per-node timeout, concurrency bounded by
/// available parallelism, and an in-memory checkpoint store.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Hard ceiling on supersteps per invocation. Exceeding it fails the
    /// run rather than letting an unguarded cycle spin forever.
    pub max_supersteps: u64,
    /// Failure policy for node errors and timeouts.
    pub error_policy: ErrorPolicy,
    /// Per-node execution timeout; a timed-out node counts as failed.
    pub node_timeout: Option<Duration>,
    /// Cap on concurrently running nodes within one superstep.
    pub concurrency_limit: Option<usize>,
    /// Fixed session id for `invoke`; a fresh id is generated when unset.
    pub session_id: Option<String>,
    /// Checkpoint backend.
    pub store: StoreKind,
    /// SQLite database path override (`sqlite` feature).
    pub sqlite_db_path: Option<String>,
    /// Event sinks attached to runs of this workflow.
    pub event_bus: EventBusConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_supersteps: Self::DEFAULT_MAX_SUPERSTEPS,
            error_policy: ErrorPolicy::default(),
            node_timeout: None,
            concurrency_limit: None,
            session_id: None,
            store: StoreKind::default(),
            sqlite_db_path: None,
            event_bus: EventBusConfig::default(),
        }
    }
}

impl RunConfig {
    pub const DEFAULT_MAX_SUPERSTEPS: u64 = 64;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_supersteps(mut self, limit: u64) -> Self {
        self.max_supersteps = limit.max(1);
        self
    }

    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    #[must_use]
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit.max(1));
        self
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, event_bus: EventBusConfig) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Effective intra-superstep concurrency.
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency_limit.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Builds the checkpoint store selected by this configuration.
    pub(crate) async fn build_store(&self) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
        match self.store {
            StoreKind::InMemory => Ok(Arc::new(InMemoryStore::new())),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite => {
                let path = resolve_sqlite_path(self.sqlite_db_path.as_deref());
                ensure_sqlite_file(&path);
                let url = format!("sqlite://{path}");
                let store = crate::runtime::checkpoint_sqlite::SqliteStore::connect(&url).await?;
                Ok(Arc::new(store))
            }
        }
    }
}

/// Resolve the SQLite database path from the explicit override, the
/// environment (`GRAPHLOOM_SQLITE_PATH`, `.env` supported), or the
/// default file name.
#[cfg(feature = "sqlite")]
fn resolve_sqlite_path(provided: Option<&str>) -> String {
    if let Some(path) = provided {
        return path.to_string();
    }
    dotenvy::dotenv().ok();
    std::env::var("GRAPHLOOM_SQLITE_PATH").unwrap_or_else(|_| "graphloom.db".to_string())
}

/// Make sure the database file exists so SQLite can open it.
#[cfg(feature = "sqlite")]
fn ensure_sqlite_file(path: &str) {
    let path = path.trim();
    if path.is_empty() {
        return;
    }
    let p = std::path::Path::new(path);
    if let Some(parent) = p.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if !p.exists() {
        // Ignore the result; connect reports the real error if any.
        let _ = std::fs::File::create_new(p);
    }
}

/// Declarative sink selection, turned into an [`EventBus`] per run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkConfig {
    StdOut,
    Memory,
}

/// Event bus configuration carried on [`RunConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBusConfig {
    pub sinks: Vec<SinkConfig>,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::stdout_only()
    }
}

impl EventBusConfig {
    #[must_use]
    pub fn stdout_only() -> Self {
        Self {
            sinks: vec![SinkConfig::StdOut],
        }
    }

    #[must_use]
    pub fn silent() -> Self {
        Self { sinks: Vec::new() }
    }

    #[must_use]
    pub fn add_sink(mut self, sink: SinkConfig) -> Self {
        if !self.sinks.contains(&sink) {
            self.sinks.push(sink);
        }
        self
    }

    #[must_use]
    pub fn build_event_bus(&self) -> EventBus {
        let sinks = self
            .sinks
            .iter()
            .map(|sink| -> Box<dyn crate::event_bus::EventSink> {
                match sink {
                    SinkConfig::StdOut => Box::new(StdOutSink::default()),
                    SinkConfig::Memory => Box::new(MemorySink::new()),
                }
            })
            .collect();
        EventBus::with_sinks(sinks)
    }
}
