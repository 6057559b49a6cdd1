// Access code record service (CRUD + search)

use crate::application::broadcaster::EventBroadcaster;
use crate::application::constants::MAX_PAGE_SIZE;
use crate::application::key_lock::KeyedLocks;
use crate::application::resolver::validate_visitor_id;
use crate::domain::{
    AccessCode, AccessCodeComposite, CodeId, CodeSearchCriteria, CodeStatus, EventName,
    NewAccessCode, Page, QueueId,
};
use crate::error::{AppError, Result};
use crate::port::{CodeStore, TimeProvider};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Fields for a code created directly (not through visitor resolution)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCodeRequest {
    pub queue_id: QueueId,
    #[serde(default)]
    pub visitor_id: Option<String>,
    /// Only WAITING is accepted; absent means WAITING
    #[serde(default)]
    pub status: Option<CodeStatus>,
    /// Epoch ms; absent means now
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Global code counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeStatusCounts {
    pub waiting: i64,
    pub attending: i64,
    pub attended: i64,
}

pub struct AccessCodeService {
    store: Arc<dyn CodeStore>,
    time_provider: Arc<dyn TimeProvider>,
    broadcaster: Arc<EventBroadcaster>,
    queue_locks: Arc<KeyedLocks<QueueId>>,
}

impl AccessCodeService {
    pub fn new(
        store: Arc<dyn CodeStore>,
        time_provider: Arc<dyn TimeProvider>,
        broadcaster: Arc<EventBroadcaster>,
        queue_locks: Arc<KeyedLocks<QueueId>>,
    ) -> Self {
        Self {
            store,
            time_provider,
            broadcaster,
            queue_locks,
        }
    }

    pub async fn get_code(&self, id: CodeId) -> Result<AccessCode> {
        self.store
            .find_code(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Access code {} not found", id)))
    }

    pub async fn get_code_composite(&self, id: CodeId) -> Result<AccessCodeComposite> {
        let access_code = self.get_code(id).await?;
        let queue = self
            .store
            .find_queue(access_code.queue_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Queue {} not found", access_code.queue_id))
            })?;
        Ok(AccessCodeComposite { access_code, queue })
    }

    pub async fn search_codes(&self, criteria: &CodeSearchCriteria) -> Result<Page<AccessCode>> {
        validate_page_size(criteria.pageable.page_size)?;
        self.store.search_codes(criteria).await
    }

    /// Search, pairing each code with its queue
    pub async fn search_code_composites(
        &self,
        criteria: &CodeSearchCriteria,
    ) -> Result<Page<AccessCodeComposite>> {
        let page = self.search_codes(criteria).await?;

        let mut queues = HashMap::new();
        for code in &page.content {
            if queues.contains_key(&code.queue_id) {
                continue;
            }
            let queue = self.store.find_queue(code.queue_id).await?.ok_or_else(|| {
                AppError::NotFound(format!("Queue {} not found", code.queue_id))
            })?;
            queues.insert(code.queue_id, queue);
        }

        let mut content = Vec::with_capacity(page.content.len());
        for access_code in page.content {
            let queue = queues
                .get(&access_code.queue_id)
                .cloned()
                .ok_or_else(|| AppError::Internal("queue lookup missing".to_string()))?;
            content.push(AccessCodeComposite { access_code, queue });
        }
        Ok(Page {
            content,
            page_number: page.page_number,
            page_size: page.page_size,
            total_elements: page.total_elements,
        })
    }

    /// Codes of one queue, FIFO order
    pub async fn find_by_queue(&self, queue_id: QueueId) -> Result<Vec<AccessCode>> {
        self.store.find_codes_by_queue(queue_id).await
    }

    pub async fn create_code(&self, req: CreateCodeRequest) -> Result<AccessCode> {
        if let Some(visitor_id) = &req.visitor_id {
            validate_visitor_id(visitor_id)?;
        }
        if let Some(status) = req.status {
            if status != CodeStatus::Waiting {
                return Err(AppError::Validation(format!(
                    "New access codes must be WAITING, got {}",
                    status
                )));
            }
        }

        let _guard = self.queue_locks.lock(req.queue_id).await;
        if self.store.find_queue(req.queue_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Queue {} not found", req.queue_id)));
        }

        let created_at = req
            .created_at
            .unwrap_or_else(|| self.time_provider.now_millis());
        let created = self
            .store
            .insert_code(&NewAccessCode::waiting(req.queue_id, req.visitor_id, created_at))
            .await?;

        info!(code_id = created.id, queue_id = created.queue_id, "Access code created");
        self.broadcaster.publish(EventName::NewCodeAdded, &created);
        Ok(created)
    }

    /// Update status, timestamps and visitor of an existing code.
    ///
    /// Status only moves forward one step at a time; the queue never changes.
    /// An assigned visitor and recorded timestamps are kept.
    pub async fn update_code(&self, code: AccessCode) -> Result<AccessCode> {
        let queue_id = self.get_code(code.id).await?.queue_id;
        let _guard = self.queue_locks.lock(queue_id).await;

        // Re-read under the lock
        let stored = self.get_code(code.id).await?;
        if code.queue_id != stored.queue_id {
            return Err(AppError::Validation(format!(
                "Access code {} cannot move from queue {} to {}",
                code.id, stored.queue_id, code.queue_id
            )));
        }
        if let Some(visitor_id) = &code.visitor_id {
            validate_visitor_id(visitor_id)?;
        }
        // A visitor keeps its code for life
        if stored.visitor_id.is_some() && code.visitor_id != stored.visitor_id {
            return Err(AppError::Validation(format!(
                "Access code {} visitor cannot change once assigned",
                code.id
            )));
        }

        let mut updated = code;
        updated.created_at = stored.created_at;
        updated.attending_at = stored.attending_at.or(updated.attending_at);
        updated.attended_at = stored.attended_at.or(updated.attended_at);

        if updated.status == stored.status {
            if !self.store.update_code(&updated).await? {
                return Err(AppError::NotFound(format!("Access code {} not found", updated.id)));
            }
            debug!(code_id = updated.id, "Access code updated");
            return Ok(updated);
        }

        if !stored.status.can_transition_to(updated.status) {
            return Err(AppError::Validation(format!(
                "Access code status cannot change from {} to {}",
                stored.status, updated.status
            )));
        }
        let now = self.time_provider.now_millis();
        match updated.status {
            CodeStatus::Attending => {
                updated.attending_at.get_or_insert(now);
            }
            CodeStatus::Attended => {
                updated.attended_at.get_or_insert(now);
            }
            CodeStatus::Waiting => {}
        }

        let mut tx = self.store.begin_transaction().await?;
        if !tx.transition_code(&updated, stored.status).await? {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Access code {} changed concurrently",
                updated.id
            )));
        }
        tx.commit().await?;

        info!(
            code_id = updated.id,
            from = %stored.status,
            to = %updated.status,
            "Access code status changed"
        );
        Ok(updated)
    }

    pub async fn delete_code(&self, id: CodeId) -> Result<bool> {
        let deleted = self.store.delete_code(id).await?;
        if deleted {
            info!(code_id = id, "Access code deleted");
        }
        Ok(deleted)
    }

    /// Global counts per status
    pub async fn status_counts(&self) -> Result<CodeStatusCounts> {
        Ok(CodeStatusCounts {
            waiting: self.store.count_codes_by_status(None, CodeStatus::Waiting).await?,
            attending: self.store.count_codes_by_status(None, CodeStatus::Attending).await?,
            attended: self.store.count_codes_by_status(None, CodeStatus::Attended).await?,
        })
    }
}

fn validate_page_size(page_size: u32) -> Result<()> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(AppError::Validation(format!(
            "page_size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewQueue, Pageable, Queue};
    use crate::port::mocks::{InMemoryCodeStore, SteppingClock};
    use crate::port::QueueRepository;

    async fn setup() -> (AccessCodeService, Arc<EventBroadcaster>, Queue) {
        let store = InMemoryCodeStore::new();
        let queue = store
            .insert_queue(&NewQueue::new("pharmacy", 0, 30))
            .await
            .unwrap();
        let broadcaster = Arc::new(EventBroadcaster::new(16));
        let service = AccessCodeService::new(
            Arc::new(store),
            Arc::new(SteppingClock::new(10_000, 100)),
            Arc::clone(&broadcaster),
            Arc::new(KeyedLocks::new()),
        );
        (service, broadcaster, queue)
    }

    fn request(queue_id: QueueId) -> CreateCodeRequest {
        CreateCodeRequest {
            queue_id,
            visitor_id: None,
            status: None,
            created_at: None,
        }
    }

    fn criteria(queue_id: Option<QueueId>, page_number: u32, page_size: u32) -> CodeSearchCriteria {
        CodeSearchCriteria {
            queue_id,
            status: None,
            visitor_id: None,
            pageable: Pageable::new(page_number, page_size),
        }
    }

    #[tokio::test]
    async fn test_create_defaults_and_event() {
        let (service, broadcaster, queue) = setup().await;
        let mut events = broadcaster.subscribe();

        let code = service.create_code(request(queue.id)).await.unwrap();
        assert_eq!(code.status, CodeStatus::Waiting);
        assert_eq!(code.created_at, 10_000);

        let event = events.try_recv().unwrap();
        assert_eq!(event.name, EventName::NewCodeAdded);
        assert_eq!(event.payload["id"], code.id);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_queue_and_non_waiting_status() {
        let (service, _broadcaster, queue) = setup().await;
        let err = service.create_code(request(77)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let mut req = request(queue.id);
        req.status = Some(CodeStatus::Attending);
        let err = service.create_code(req).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_and_composite() {
        let (service, _broadcaster, queue) = setup().await;
        let code = service.create_code(request(queue.id)).await.unwrap();

        assert_eq!(service.get_code(code.id).await.unwrap(), code);
        let composite = service.get_code_composite(code.id).await.unwrap();
        assert_eq!(composite.queue, queue);

        let err = service.get_code(code.id + 100).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_search_pages_in_fifo_order() {
        let (service, _broadcaster, queue) = setup().await;
        let mut created = Vec::new();
        for created_at in [3_000, 1_000, 2_000] {
            let mut req = request(queue.id);
            req.created_at = Some(created_at);
            created.push(service.create_code(req).await.unwrap());
        }

        let page = service.search_codes(&criteria(Some(queue.id), 0, 2)).await.unwrap();
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.content.len(), 2);
        assert_eq!(page.content[0].created_at, 1_000);
        assert_eq!(page.content[1].created_at, 2_000);

        let page = service
            .search_code_composites(&criteria(None, 1, 2))
            .await
            .unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.content[0].access_code.created_at, 3_000);
        assert_eq!(page.content[0].queue.id, queue.id);

        let err = service.search_codes(&criteria(None, 0, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = service
            .search_codes(&criteria(None, 0, MAX_PAGE_SIZE + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_keeps_visitor_and_recorded_times() {
        let (service, _broadcaster, queue) = setup().await;
        let mut req = request(queue.id);
        req.visitor_id = Some("v".to_string());
        let code = service.create_code(req).await.unwrap();

        let mut cleared = code.clone();
        cleared.visitor_id = None;
        let err = service.update_code(cleared).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut swapped = code.clone();
        swapped.visitor_id = Some("w".to_string());
        let err = service.update_code(swapped).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            service.get_code(code.id).await.unwrap().visitor_id.as_deref(),
            Some("v")
        );

        let mut attending = code.clone();
        attending.status = CodeStatus::Attending;
        let attending = service.update_code(attending).await.unwrap();
        let stamped = attending.attending_at.unwrap();

        // Same-status update cannot erase or rewrite the stamp
        let mut erased = attending.clone();
        erased.attending_at = None;
        assert_eq!(service.update_code(erased).await.unwrap().attending_at, Some(stamped));
        let mut rewritten = attending.clone();
        rewritten.attending_at = Some(1);
        assert_eq!(
            service.update_code(rewritten).await.unwrap().attending_at,
            Some(stamped)
        );
        assert_eq!(
            service.get_code(code.id).await.unwrap().attending_at,
            Some(stamped)
        );
    }

    #[tokio::test]
    async fn test_update_moves_forward_and_stamps_time() {
        let (service, _broadcaster, queue) = setup().await;
        let code = service.create_code(request(queue.id)).await.unwrap();

        let mut attending = code.clone();
        attending.status = CodeStatus::Attending;
        let attending = service.update_code(attending).await.unwrap();
        assert!(attending.attending_at.is_some());

        let mut back = attending.clone();
        back.status = CodeStatus::Waiting;
        let err = service.update_code(back).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut moved = attending.clone();
        moved.queue_id = queue.id + 1;
        let err = service.update_code(moved).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_cannot_skip_or_double_attend() {
        let (service, _broadcaster, queue) = setup().await;
        let a = service.create_code(request(queue.id)).await.unwrap();
        let b = service.create_code(request(queue.id)).await.unwrap();

        let mut skip = a.clone();
        skip.status = CodeStatus::Attended;
        assert!(matches!(
            service.update_code(skip).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let mut a_attending = a.clone();
        a_attending.status = CodeStatus::Attending;
        service.update_code(a_attending).await.unwrap();

        let mut b_attending = b.clone();
        b_attending.status = CodeStatus::Attending;
        assert!(service.update_code(b_attending).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_delete_reports_whether_removed() {
        let (service, _broadcaster, queue) = setup().await;
        let code = service.create_code(request(queue.id)).await.unwrap();
        assert!(service.delete_code(code.id).await.unwrap());
        assert!(!service.delete_code(code.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_status_counts() {
        let (service, _broadcaster, queue) = setup().await;
        let code = service.create_code(request(queue.id)).await.unwrap();
        service.create_code(request(queue.id)).await.unwrap();
        let mut attending = code;
        attending.status = CodeStatus::Attending;
        service.update_code(attending).await.unwrap();

        let counts = service.status_counts().await.unwrap();
        assert_eq!(
            counts,
            CodeStatusCounts {
                waiting: 1,
                attending: 1,
                attended: 0
            }
        );
    }
}
