use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio::task;

use super::event::Event;
use super::sink::{EventSink, StdOutSink};

/// Receives events from producers and broadcasts them to all sinks.
///
/// The bus owns an unbounded channel; producers hold cheap sender clones
/// obtained via [`sender`](EventBus::sender). A background listener task,
/// started with [`listen`](EventBus::listen), drains the channel and fans
/// each event out to every registered sink.
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    channel: (flume::Sender<Event>, flume::Receiver<Event>),
    listener: Arc<Mutex<Option<ListenerState>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl EventBus {
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self::with_sinks(vec![Box::new(sink)])
    }

    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            channel: flume::unbounded(),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Dynamically add a sink, e.g. for per-run streaming.
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks
            .lock()
            .expect("event bus sinks poisoned")
            .push(Box::new(sink));
    }

    /// Clone of the sender side for event producers.
    #[must_use]
    pub fn sender(&self) -> flume::Sender<Event> {
        self.channel.0.clone()
    }

    /// Spawn the background listener. Idempotent.
    pub fn listen(&self) {
        let mut guard = self.listener.lock().expect("event bus listener poisoned");
        if guard.is_some() {
            return;
        }

        let receiver = self.channel.1.clone();
        let sinks = self.sinks.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            let broadcast = |event: Event| {
                let mut sinks = sinks.lock().expect("event bus sinks poisoned");
                for sink in sinks.iter_mut() {
                    if let Err(e) = sink.handle(&event) {
                        tracing::debug!(error = %e, "event sink failed");
                    }
                }
            };
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        // Drain everything already enqueued before stopping.
                        while let Ok(event) = receiver.try_recv() {
                            broadcast(event);
                        }
                        break;
                    }
                    recv = receiver.recv_async() => match recv {
                        Err(_) => break,
                        Ok(event) => broadcast(event),
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener, draining nothing further.
    pub async fn shutdown(&self) {
        let state = {
            let mut guard = self.listener.lock().expect("event bus listener poisoned");
            guard.take()
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener.lock() {
            if let Some(state) = guard.take() {
                let _ = state.shutdown_tx.send(());
                state.handle.abort();
            }
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}
