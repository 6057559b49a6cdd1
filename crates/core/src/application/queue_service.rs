// Queue record service

use crate::application::constants::{DEFAULT_MIN_ATTENTION_TIME_SECS, MAX_QUEUE_NAME_LEN};
use crate::domain::{NewQueue, Queue, QueueId};
use crate::error::{AppError, Result};
use crate::port::{CodeStore, TimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Fields accepted when creating a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQueueRequest {
    pub name: String,
    #[serde(default)]
    pub min_attention_time_secs: Option<i64>,
}

pub struct QueueService {
    store: Arc<dyn CodeStore>,
    time_provider: Arc<dyn TimeProvider>,
}

impl QueueService {
    pub fn new(store: Arc<dyn CodeStore>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            store,
            time_provider,
        }
    }

    pub async fn get_queue(&self, id: QueueId) -> Result<Queue> {
        self.store
            .find_queue(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Queue {} not found", id)))
    }

    pub async fn list_queues(&self) -> Result<Vec<Queue>> {
        self.store.find_all_queues().await
    }

    /// Create a not-started queue stamped with the current time
    pub async fn create_queue(&self, req: CreateQueueRequest) -> Result<Queue> {
        let name = validate_name(&req.name)?;
        let min_attention = req
            .min_attention_time_secs
            .unwrap_or(DEFAULT_MIN_ATTENTION_TIME_SECS);
        validate_min_attention(min_attention)?;

        let queue = self
            .store
            .insert_queue(&NewQueue::new(
                name,
                self.time_provider.now_millis(),
                min_attention,
            ))
            .await?;
        info!(queue_id = queue.id, name = %queue.name, "Queue created");
        Ok(queue)
    }

    /// Rename / change minimum attention time. `started` is kept as stored.
    pub async fn update_queue(&self, queue: Queue) -> Result<Queue> {
        let stored = self.get_queue(queue.id).await?;
        let updated = Queue {
            name: validate_name(&queue.name)?,
            min_attention_time_secs: validate_min_attention(queue.min_attention_time_secs)?,
            ..stored
        };

        if !self.store.update_queue(&updated).await? {
            return Err(AppError::NotFound(format!("Queue {} not found", updated.id)));
        }
        info!(queue_id = updated.id, "Queue updated");
        Ok(updated)
    }

    /// Fails with Conflict while codes still reference the queue
    pub async fn delete_queue(&self, id: QueueId) -> Result<bool> {
        let deleted = self.store.delete_queue(id).await?;
        if deleted {
            info!(queue_id = id, "Queue deleted");
        }
        Ok(deleted)
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Queue name must not be blank".to_string()));
    }
    if name.chars().count() > MAX_QUEUE_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Queue name exceeds {} characters",
            MAX_QUEUE_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn validate_min_attention(secs: i64) -> Result<i64> {
    if secs <= 0 {
        return Err(AppError::Validation(
            "min_attention_time_secs must be positive".to_string(),
        ));
    }
    Ok(secs)
}
