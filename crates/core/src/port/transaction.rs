// Transaction port for atomic multi-step operations

use crate::domain::{AccessCode, CodeStatus, QueueId};
use crate::error::Result;
use async_trait::async_trait;

/// Transaction trait for atomic multi-step operations
///
/// Dropping a transaction without `commit` rolls it back.
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Stores that can open a transaction
#[async_trait]
pub trait TransactionalCodeStore: Send + Sync {
    /// Begin a new transaction
    async fn begin_transaction(&self) -> Result<Box<dyn CodeStoreTransaction>>;
}

/// Conditional (compare-and-swap) writes within a transaction
#[async_trait]
pub trait CodeStoreTransaction: Transaction {
    /// Persist `code`'s status and timestamps only if the stored status is still
    /// `expected`. Returns false when the stored row no longer matches.
    async fn transition_code(&mut self, code: &AccessCode, expected: CodeStatus) -> Result<bool>;

    /// Set `started` only if the queue is not started yet
    async fn mark_queue_started(&mut self, queue_id: QueueId) -> Result<bool>;

    /// Normalize every code of the queue that is neither ATTENDING nor ATTENDED to WAITING
    ///
    /// Codes already called are left as they are. Returns the number of
    /// WAITING rows written, not the size of the queue.
    async fn reset_codes_to_waiting(&mut self, queue_id: QueueId) -> Result<u64>;
}
