//! # EventBroadcaster: best-effort fan-out to live subscribers
//!
//! Each subscriber owns a bounded channel. `broadcast` pushes one event into
//! every channel with `try_send`, so a slow or gone subscriber never blocks the
//! others or the operation that triggered the event.
//!
//! ## Rules
//! - **At-most-once**: no buffering for absent subscribers, no retry.
//! - **Fault isolation**: a failed delivery (channel full or closed) drops that
//!   subscriber from the live set within the same `broadcast` call.
//! - **Never fails the caller**: delivery problems are logged, not returned.
//!
//! ```text
//!   broadcast(name, payload)
//!        ├──► [chan S1] ─► Subscription S1 (API stream)
//!        ├──► [chan S2] ✗ closed → removed
//!        └──► [chan SN] ─► Subscription SN
//! ```

use crate::domain::{EventName, QueueEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Opaque subscriber handle
pub type SubscriberId = u64;

/// Receiving end of one subscriber
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<QueueEvent>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event; `None` once the subscriber was removed and its buffer drained
    pub async fn recv(&mut self) -> Option<Arc<QueueEvent>> {
        self.rx.recv().await
    }

    /// Next buffered event without waiting
    pub fn try_recv(&mut self) -> Option<Arc<QueueEvent>> {
        self.rx.try_recv().ok()
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Process-wide subscriber set, explicitly owned (no global state)
pub struct EventBroadcaster {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Arc<QueueEvent>>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl EventBroadcaster {
    /// Creates a broadcaster whose subscribers buffer up to `buffer` events (min 1)
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    fn subscribers(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<Arc<QueueEvent>>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new live subscriber
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        self.subscribers().insert(id, tx);
        debug!(subscriber_id = id, "Subscriber registered");
        Subscription { id, rx }
    }

    /// Remove a subscriber; unknown or already-removed handles are a no-op
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers().remove(&id).is_some() {
            debug!(subscriber_id = id, "Subscriber removed");
        }
    }

    /// Deliver `(name, payload)` to every currently registered subscriber
    pub fn broadcast(&self, name: EventName, payload: serde_json::Value) -> BroadcastReport {
        let event = Arc::new(QueueEvent::new(name, payload));
        let mut report = BroadcastReport::default();
        let mut subscribers = self.subscribers();

        subscribers.retain(|id, sender| match sender.try_send(Arc::clone(&event)) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(subscriber_id = id, event = %name, "Subscriber buffer full, dropping subscriber");
                report.dropped += 1;
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(subscriber_id = id, event = %name, "Subscriber disconnected, dropping subscriber");
                report.dropped += 1;
                false
            }
        });

        debug!(
            event = %name,
            delivered = report.delivered,
            dropped = report.dropped,
            "Event broadcast"
        );
        report
    }

    /// Serialize `payload` and broadcast it.
    ///
    /// A payload that cannot be serialized is logged and skipped.
    pub fn publish<T: Serialize>(&self, name: EventName, payload: &T) -> BroadcastReport {
        match serde_json::to_value(payload) {
            Ok(value) => self.broadcast(name, value),
            Err(e) => {
                warn!(event = %name, error = %e, "Event payload not serializable, skipping broadcast");
                BroadcastReport::default()
            }
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(crate::application::constants::DEFAULT_SUBSCRIBER_BUFFER)
    }
}
