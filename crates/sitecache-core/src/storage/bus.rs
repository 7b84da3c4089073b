use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tracing::trace;

/// Buffered notifications per subscriber before the oldest are dropped.
const BUS_CAPACITY: usize = 256;

static NEXT_WRITER: AtomicU64 = AtomicU64::new(1);

/// Identifies who performed a durable write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriterId(u64);

impl WriterId {
    pub fn next() -> Self {
        Self(NEXT_WRITER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A durable key changed. `value` is `None` when the key was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub value: Option<String>,
    pub origin: WriterId,
}

/// Change notifications for a shared durable storage.
///
/// Delivery is best effort: a lagging subscriber loses the oldest events.
#[derive(Debug, Clone)]
pub struct StorageBus {
    tx: broadcast::Sender<StorageEvent>,
}

impl Default for StorageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: StorageEvent) {
        // No subscribers is not an error
        if self.tx.send(event).is_err() {
            trace!("Storage event published with no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.tx.subscribe()
    }
}
