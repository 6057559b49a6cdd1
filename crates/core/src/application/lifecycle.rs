// QueueLifecycle - one-shot queue start

use crate::application::broadcaster::EventBroadcaster;
use crate::application::key_lock::KeyedLocks;
use crate::domain::{EventName, Queue, QueueId};
use crate::error::{AppError, Result};
use crate::port::CodeStore;
use std::sync::Arc;
use tracing::{debug, info};

pub struct QueueLifecycle {
    store: Arc<dyn CodeStore>,
    broadcaster: Arc<EventBroadcaster>,
    queue_locks: Arc<KeyedLocks<QueueId>>,
}

impl QueueLifecycle {
    pub fn new(
        store: Arc<dyn CodeStore>,
        broadcaster: Arc<EventBroadcaster>,
        queue_locks: Arc<KeyedLocks<QueueId>>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            queue_locks,
        }
    }

    /// Mark the queue started, normalize its codes, announce QUEUE_STARTED.
    ///
    /// Starting an already-started queue is a no-op returning the stored queue
    /// (no event, codes untouched).
    pub async fn start_queue(&self, queue_id: QueueId) -> Result<Queue> {
        let _guard = self.queue_locks.lock(queue_id).await;

        let mut queue = self
            .store
            .find_queue(queue_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Queue {} not found", queue_id)))?;

        if queue.started {
            debug!(queue_id, "Queue already started");
            return Ok(queue);
        }

        let mut tx = self.store.begin_transaction().await?;
        if !tx.mark_queue_started(queue_id).await? {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Queue {} was started concurrently",
                queue_id
            )));
        }
        let waiting = tx.reset_codes_to_waiting(queue_id).await?;
        tx.commit().await?;

        queue.start()?;
        info!(queue_id, waiting, "Queue started");
        self.broadcaster.publish(EventName::QueueStarted, &queue);
        Ok(queue)
    }
}
