// Access Code Repository Port (Interface)

use crate::domain::{
    AccessCode, CodeId, CodeSearchCriteria, CodeStatus, NewAccessCode, Page, QueueId,
};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for AccessCode persistence
#[async_trait]
pub trait AccessCodeRepository: Send + Sync {
    /// Insert a new code; the store assigns the id.
    ///
    /// Fails with `AppError::Conflict` when `visitor_id` is already taken.
    async fn insert_code(&self, code: &NewAccessCode) -> Result<AccessCode>;

    /// Find code by ID
    async fn find_code(&self, id: CodeId) -> Result<Option<AccessCode>>;

    /// Find the single code issued to a visitor
    async fn find_code_by_visitor(&self, visitor_id: &str) -> Result<Option<AccessCode>>;

    /// All codes of a queue in FIFO order
    async fn find_codes_by_queue(&self, queue_id: QueueId) -> Result<Vec<AccessCode>>;

    /// Update status, timestamps and visitor; returns false if the code does not exist
    async fn update_code(&self, code: &AccessCode) -> Result<bool>;

    /// Delete code; returns false if nothing was deleted
    async fn delete_code(&self, id: CodeId) -> Result<bool>;

    /// Oldest WAITING code of a queue (created_at ASC, id ASC)
    async fn find_next_waiting(&self, queue_id: QueueId) -> Result<Option<AccessCode>>;

    /// Codes of a queue with the given status, FIFO order
    async fn find_codes_by_status(
        &self,
        queue_id: QueueId,
        status: CodeStatus,
    ) -> Result<Vec<AccessCode>>;

    /// Count codes by status, optionally scoped to one queue
    async fn count_codes_by_status(
        &self,
        queue_id: Option<QueueId>,
        status: CodeStatus,
    ) -> Result<i64>;

    /// Number of WAITING codes in the same queue served before `code`
    async fn count_waiting_ahead(&self, code: &AccessCode) -> Result<i64>;

    /// Paged search, FIFO order
    async fn search_codes(&self, criteria: &CodeSearchCriteria) -> Result<Page<AccessCode>>;
}
