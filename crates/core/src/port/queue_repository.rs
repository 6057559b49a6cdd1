// Queue Repository Port (Interface)

use crate::domain::{NewQueue, Queue, QueueId};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Queue persistence
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Insert a new queue; the store assigns the id
    async fn insert_queue(&self, queue: &NewQueue) -> Result<Queue>;

    /// Find queue by ID
    async fn find_queue(&self, id: QueueId) -> Result<Option<Queue>>;

    /// All queues ordered by id
    async fn find_all_queues(&self) -> Result<Vec<Queue>>;

    /// Update name and minimum attention time (never `started`)
    async fn update_queue(&self, queue: &Queue) -> Result<bool>;

    /// Delete queue; fails with `AppError::Conflict` while codes still reference it
    async fn delete_queue(&self, id: QueueId) -> Result<bool>;
}
