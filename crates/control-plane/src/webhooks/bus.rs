// In-process event bus
// Decision: Inline mode runs the dispatch cycle on the emitting task, one cycle at a time
// Decision: Background mode hands events to a single worker over a bounded queue
//
// Both modes keep events in emission order: a single consumer handles one
// cycle to settlement before starting the next.

use async_trait::async_trait;
use mailplate_core::{Event, EventEmitter};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::dispatcher::Dispatcher;

/// How the bus runs dispatch cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// The mutating request waits for its cycle to settle
    #[default]
    Inline,
    /// The request returns once the event is queued
    Background,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Inline => f.write_str("inline"),
            DeliveryMode::Background => f.write_str("background"),
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inline" => Ok(DeliveryMode::Inline),
            "background" => Ok(DeliveryMode::Background),
            other => Err(format!("Unknown delivery mode: {}", other)),
        }
    }
}

struct Worker {
    sender: mpsc::Sender<Event>,
    handle: JoinHandle<()>,
}

/// Publish point wired into every CRUD service
pub struct EventBus {
    dispatcher: Arc<Dispatcher>,
    mode: DeliveryMode,
    // Serializes inline cycles
    inline_lock: Mutex<()>,
    worker: parking_lot::Mutex<Option<Worker>>,
}

impl EventBus {
    /// Create a bus. Background mode spawns its worker, so it must be
    /// called from inside a tokio runtime.
    pub fn new(dispatcher: Arc<Dispatcher>, mode: DeliveryMode, queue_capacity: usize) -> Self {
        let worker = match mode {
            DeliveryMode::Inline => None,
            DeliveryMode::Background => Some(spawn_worker(dispatcher.clone(), queue_capacity)),
        };

        tracing::info!(mode = %mode, "Event bus started");

        Self {
            dispatcher,
            mode,
            inline_lock: Mutex::new(()),
            worker: parking_lot::Mutex::new(worker),
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Stop accepting background events and wait for queued cycles to settle.
    /// Later emits fall back to inline dispatch.
    pub async fn shutdown(&self) {
        let worker = self.worker.lock().take();
        let Some(Worker { sender, handle }) = worker else {
            return;
        };

        drop(sender);
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Event bus worker ended abnormally");
        }
        tracing::info!("Event bus drained");
    }

    async fn dispatch_inline(&self, event: Event) {
        let _cycle = self.inline_lock.lock().await;
        self.dispatcher.handle(&event).await;
    }
}

fn spawn_worker(dispatcher: Arc<Dispatcher>, capacity: usize) -> Worker {
    let (sender, mut receiver) = mpsc::channel::<Event>(capacity.max(1));

    let handle = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            dispatcher.handle(&event).await;
        }
        tracing::debug!("Event bus worker stopped");
    });

    Worker { sender, handle }
}

#[async_trait]
impl EventEmitter for EventBus {
    async fn emit(&self, event: Event) {
        tracing::debug!(event = %event.event, "Event emitted");

        let sender = self.worker.lock().as_ref().map(|w| w.sender.clone());
        match sender {
            Some(sender) => {
                if let Err(e) = sender.send(event).await {
                    // Worker is gone; run the cycle here instead of losing it
                    tracing::warn!("Event bus worker unavailable, dispatching inline");
                    self.dispatch_inline(e.0).await;
                }
            }
            None => self.dispatch_inline(event).await,
        }
    }
}
