// CodeResolver - idempotent visitor -> access code resolution

use crate::application::broadcaster::EventBroadcaster;
use crate::application::constants::MAX_VISITOR_ID_LEN;
use crate::application::key_lock::KeyedLocks;
use crate::domain::{AccessCode, EventName, NewAccessCode, QueueId};
use crate::error::{AppError, Result};
use crate::port::{CodeStore, TimeProvider};
use std::sync::Arc;
use tracing::{debug, info};

/// Maps a visitor to exactly one access code, creating it on first sight
pub struct CodeResolver {
    store: Arc<dyn CodeStore>,
    time_provider: Arc<dyn TimeProvider>,
    broadcaster: Arc<EventBroadcaster>,
    visitor_locks: KeyedLocks<String>,
}

impl CodeResolver {
    pub fn new(
        store: Arc<dyn CodeStore>,
        time_provider: Arc<dyn TimeProvider>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            store,
            time_provider,
            broadcaster,
            visitor_locks: KeyedLocks::new(),
        }
    }

    /// Return the visitor's code, or create a WAITING one in `queue_id`.
    ///
    /// An existing code is returned as-is regardless of its status or queue.
    pub async fn resolve_by_visitor(
        &self,
        visitor_id: &str,
        queue_id: QueueId,
    ) -> Result<AccessCode> {
        validate_visitor_id(visitor_id)?;

        let _guard = self.visitor_locks.lock(visitor_id.to_string()).await;

        if let Some(existing) = self.store.find_code_by_visitor(visitor_id).await? {
            debug!(visitor_id, code_id = existing.id, "Visitor already has a code");
            return Ok(existing);
        }

        if self.store.find_queue(queue_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Queue {} not found", queue_id)));
        }

        let new_code = NewAccessCode::waiting(
            queue_id,
            Some(visitor_id.to_string()),
            self.time_provider.now_millis(),
        );

        match self.store.insert_code(&new_code).await {
            Ok(created) => {
                info!(visitor_id, queue_id, code_id = created.id, "Access code created");
                self.broadcaster.publish(EventName::NewCodeAdded, &created);
                Ok(created)
            }
            // Another process inserted between our read and write: the store's
            // uniqueness constraint won, so the stored row is the answer.
            Err(e) if e.is_conflict() => {
                match self.store.find_code_by_visitor(visitor_id).await? {
                    Some(existing) => {
                        debug!(visitor_id, code_id = existing.id, "Lost creation race, using stored code");
                        Ok(existing)
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}

pub(crate) fn validate_visitor_id(visitor_id: &str) -> Result<()> {
    if visitor_id.trim().is_empty() {
        return Err(AppError::Validation("visitor_id must not be empty".to_string()));
    }
    if visitor_id.chars().count() > MAX_VISITOR_ID_LEN {
        return Err(AppError::Validation(format!(
            "visitor_id exceeds {} characters",
            MAX_VISITOR_ID_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CodeStatus, NewQueue, Queue};
    use crate::port::mocks::{InMemoryCodeStore, SteppingClock};
    use crate::port::{AccessCodeRepository, QueueRepository};

    async fn setup() -> (InMemoryCodeStore, Arc<CodeResolver>, Arc<EventBroadcaster>, Queue) {
        let store = InMemoryCodeStore::new();
        let queue = store
            .insert_queue(&NewQueue::new("lobby", 0, 60))
            .await
            .unwrap();
        let broadcaster = Arc::new(EventBroadcaster::new(64));
        let resolver = Arc::new(CodeResolver::new(
            Arc::new(store.clone()),
            Arc::new(SteppingClock::new(1_000, 10)),
            Arc::clone(&broadcaster),
        ));
        (store, resolver, broadcaster, queue)
    }

    #[tokio::test]
    async fn test_first_resolve_creates_waiting_code() {
        let (_store, resolver, broadcaster, queue) = setup().await;
        let mut events = broadcaster.subscribe();

        let code = resolver.resolve_by_visitor("v-1", queue.id).await.unwrap();
        assert_eq!(code.status, CodeStatus::Waiting);
        assert_eq!(code.queue_id, queue.id);
        assert_eq!(code.visitor_id.as_deref(), Some("v-1"));

        let event = events.try_recv().unwrap();
        assert_eq!(event.name, EventName::NewCodeAdded);
        assert_eq!(event.payload["id"], code.id);
    }

    #[tokio::test]
    async fn test_repeat_resolve_returns_same_code_without_event() {
        let (_store, resolver, broadcaster, queue) = setup().await;
        let first = resolver.resolve_by_visitor("v-1", queue.id).await.unwrap();

        let mut events = broadcaster.subscribe();
        let second = resolver.resolve_by_visitor("v-1", queue.id).await.unwrap();
        assert_eq!(first, second);
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_existing_code_returned_regardless_of_status() {
        let (store, resolver, _broadcaster, queue) = setup().await;
        let mut code = resolver.resolve_by_visitor("v-1", queue.id).await.unwrap();
        code.attend(5_000).unwrap();
        code.close(6_000).unwrap();
        store.update_code(&code).await.unwrap();

        let again = resolver.resolve_by_visitor("v-1", queue.id).await.unwrap();
        assert_eq!(again.id, code.id);
        assert_eq!(again.status, CodeStatus::Attended);
    }

    #[tokio::test]
    async fn test_invalid_visitor_ids_rejected() {
        let (_store, resolver, _broadcaster, queue) = setup().await;
        let err = resolver.resolve_by_visitor("", queue.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let long = "x".repeat(MAX_VISITOR_ID_LEN + 1);
        let err = resolver.resolve_by_visitor(&long, queue.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_queue_is_not_found() {
        let (store, resolver, _broadcaster, _queue) = setup().await;
        let err = resolver.resolve_by_visitor("v-1", 999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.find_code_by_visitor("v-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (store, resolver, _broadcaster, queue) = setup().await;
        store.set_failing(true);
        let err = resolver.resolve_by_visitor("v-1", queue.id).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_race_with_external_writer_returns_stored_code() {
        // A second resolver stands in for another process sharing the store
        let (store, resolver, broadcaster, queue) = setup().await;
        let other = CodeResolver::new(
            Arc::new(store.clone()),
            Arc::new(SteppingClock::fixed(0)),
            broadcaster,
        );

        let (a, b) = tokio::join!(
            resolver.resolve_by_visitor("shared", queue.id),
            other.resolve_by_visitor("shared", queue.id)
        );
        assert_eq!(a.unwrap().id, b.unwrap().id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_resolves_create_one_code() {
        let (store, resolver, broadcaster, queue) = setup().await;
        let mut events = broadcaster.subscribe();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..32 {
            let resolver = Arc::clone(&resolver);
            let queue_id = queue.id;
            tasks.spawn(async move { resolver.resolve_by_visitor("v-race", queue_id).await });
        }

        let mut ids = Vec::new();
        while let Some(result) = tasks.join_next().await {
            ids.push(result.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1, "every caller sees the same code");

        let codes = store.find_codes_by_queue(queue.id).await.unwrap();
        assert_eq!(codes.len(), 1);

        assert_eq!(events.try_recv().unwrap().name, EventName::NewCodeAdded);
        assert!(events.try_recv().is_none(), "exactly one creation event");
    }
}
