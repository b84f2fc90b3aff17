//! Chunk hub for streamed generations.
//!
//! Streaming transports publish every chunk here tagged with its request id.
//! Each streaming call subscribes before dispatching its request and drops
//! the subscription when it finishes, whatever the outcome.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// Inbound streaming event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    pub request_id: String,
    pub content: String,
}

impl StreamChunk {
    pub fn new(request_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            content: content.into(),
        }
    }
}

/// Fan-out point between streaming transports and streaming calls.
#[derive(Debug, Default)]
pub struct ChunkHub {
    next_id: AtomicU64,
    subscribers: Mutex<BTreeMap<u64, mpsc::UnboundedSender<StreamChunk>>>,
}

impl ChunkHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver `chunk` to every live subscription, returning how many received it.
    pub fn publish(&self, chunk: StreamChunk) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|_, tx| !tx.is_closed());
        let mut delivered = 0;
        for tx in subscribers.values() {
            if tx.send(chunk.clone()).is_ok() {
                delivered += 1;
            }
        }
        trace!(request_id = %chunk.request_id, delivered, "Published stream chunk");
        delivered
    }

    /// Open a subscription; it is removed from the hub when dropped.
    pub fn subscribe(self: &Arc<Self>) -> ChunkSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        ChunkSubscription {
            id,
            hub: Arc::clone(self),
            rx,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, mpsc::UnboundedSender<StreamChunk>>> {
        // Senders stay valid after a panic elsewhere, so a poisoned map is still usable.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().remove(&id);
    }
}

/// Receiving end of a hub subscription.
#[derive(Debug)]
pub struct ChunkSubscription {
    id: u64,
    hub: Arc<ChunkHub>,
    rx: mpsc::UnboundedReceiver<StreamChunk>,
}

impl ChunkSubscription {
    /// Wait for the next chunk.
    pub async fn recv(&mut self) -> Option<StreamChunk> {
        self.rx.recv().await
    }

    /// Take an already-queued chunk without waiting.
    pub fn try_recv(&mut self) -> Option<StreamChunk> {
        self.rx.try_recv().ok()
    }
}

impl Drop for ChunkSubscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
