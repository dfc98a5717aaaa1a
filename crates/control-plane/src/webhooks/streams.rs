// Live admin stream registry
// Decision: One bounded mpsc queue per connection; a slow reader loses frames
// Decision: Deregistration is tied to a guard owned by the response stream
//
// The registry is injected into both the SSE handler (connect) and the
// dispatcher (broadcast). It holds no global state.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Opaque connection handle (UUID v7, time-ordered)
pub type ConnectionId = Uuid;

struct ConnectionEntry {
    principal_id: i64,
    connected_at: DateTime<Utc>,
    sender: mpsc::Sender<Arc<str>>,
}

/// Snapshot of one connection, for diagnostics
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub principal_id: i64,
    pub connected_at: DateTime<Utc>,
}

/// Set of currently connected admin streams
pub struct StreamManager {
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
    buffer_size: usize,
    closed: AtomicBool,
}

impl StreamManager {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            buffer_size: buffer_size.max(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a connection. Frames arrive on the returned receiver until the
    /// guard is dropped or [`StreamManager::disconnect`] is called.
    ///
    /// Multiple connections per principal are allowed. After
    /// [`StreamManager::close_all`] the receiver is already closed.
    pub fn connect(
        self: &Arc<Self>,
        principal_id: i64,
    ) -> (StreamGuard, mpsc::Receiver<Arc<str>>) {
        let (sender, receiver) = mpsc::channel(self.buffer_size);
        let id = Uuid::now_v7();
        let guard = StreamGuard {
            id,
            manager: Arc::downgrade(self),
        };

        {
            // Checked under the write lock so close_all cannot miss a connection
            let mut connections = self.connections.write();
            if self.closed.load(Ordering::Acquire) {
                tracing::debug!(principal_id, "Admin stream refused during shutdown");
                return (guard, receiver);
            }
            connections.insert(
                id,
                ConnectionEntry {
                    principal_id,
                    connected_at: Utc::now(),
                    sender,
                },
            );
        }

        tracing::info!(
            connection_id = %id,
            principal_id,
            active = self.len(),
            "Admin stream connected"
        );

        (guard, receiver)
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let removed = self.connections.write().remove(&id);
        if let Some(entry) = &removed {
            tracing::info!(
                connection_id = %id,
                principal_id = entry.principal_id,
                "Admin stream disconnected"
            );
        }
        removed.is_some()
    }

    /// Queue one frame on every open connection. Returns how many accepted it.
    ///
    /// A full queue drops the frame for that connection only. A closed queue
    /// means the client went away; the connection is removed in this call.
    pub fn broadcast(&self, frame: Arc<str>) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let connections = self.connections.read();
            for (id, entry) in connections.iter() {
                match entry.sender.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            connection_id = %id,
                            principal_id = entry.principal_id,
                            "Admin stream is not keeping up, dropping frame"
                        );
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        for id in closed {
            self.disconnect(id);
        }

        delivered
    }

    /// Drop every connection and refuse new ones. Each open stream sees its
    /// receiver close and ends, which lets graceful shutdown finish.
    pub fn close_all(&self) -> usize {
        let mut connections = self.connections.write();
        self.closed.store(true, Ordering::Release);
        let count = connections.len();
        connections.clear();
        drop(connections);

        if count > 0 {
            tracing::info!(closed = count, "Closed all admin streams");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<_> = self
            .connections
            .read()
            .iter()
            .map(|(id, entry)| ConnectionInfo {
                id: *id,
                principal_id: entry.principal_id,
                connected_at: entry.connected_at,
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }
}

/// Deregisters its connection when dropped
pub struct StreamGuard {
    id: ConnectionId,
    manager: Weak<StreamManager>,
}

impl StreamGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id);
        }
    }
}
