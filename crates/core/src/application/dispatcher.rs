//! QueueDispatcher - code lifecycle state machine
//!
//! Calling the next code is one serializable unit per queue: a keyed lock
//! wraps select-then-update, and the two status writes go through one store
//! transaction with compare-and-swap on the expected prior status.

use crate::application::broadcaster::EventBroadcaster;
use crate::application::key_lock::KeyedLocks;
use crate::domain::{AccessCode, CodeStatus, EventName, NextCode, QueueId};
use crate::error::{AppError, Result};
use crate::port::{CodeStore, TimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Scope of the remaining-codes aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainingScope {
    /// WAITING codes of the requested queue
    #[default]
    PerQueue,
    /// WAITING codes across every queue
    Global,
}

pub struct QueueDispatcher {
    store: Arc<dyn CodeStore>,
    time_provider: Arc<dyn TimeProvider>,
    broadcaster: Arc<EventBroadcaster>,
    queue_locks: Arc<KeyedLocks<QueueId>>,
    remaining_scope: RemainingScope,
}

impl QueueDispatcher {
    pub fn new(
        store: Arc<dyn CodeStore>,
        time_provider: Arc<dyn TimeProvider>,
        broadcaster: Arc<EventBroadcaster>,
        queue_locks: Arc<KeyedLocks<QueueId>>,
        remaining_scope: RemainingScope,
    ) -> Self {
        Self {
            store,
            time_provider,
            broadcaster,
            queue_locks,
            remaining_scope,
        }
    }

    /// Promote the oldest WAITING code of the queue, closing the current one.
    ///
    /// Returns `Ok(None)` when nothing is waiting (state untouched).
    pub async fn call_next_code(&self, queue_id: QueueId) -> Result<Option<NextCode>> {
        let _guard = self.queue_locks.lock(queue_id).await;

        let queue = self
            .store
            .find_queue(queue_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Queue {} not found", queue_id)))?;

        let Some(mut next) = self.store.find_next_waiting(queue_id).await? else {
            debug!(queue_id, "No waiting code to call");
            return Ok(None);
        };
        let current = self.current_code_locked(queue_id).await?;

        let now = self.time_provider.now_millis();
        let mut tx = self.store.begin_transaction().await?;

        let closed = match current {
            Some(mut current) => {
                current.close(now)?;
                if !tx.transition_code(&current, CodeStatus::Attending).await? {
                    tx.rollback().await?;
                    return Err(AppError::Conflict(format!(
                        "Code {} changed while closing it",
                        current.id
                    )));
                }
                Some(current)
            }
            None => None,
        };

        next.attend(now)?;
        if !tx.transition_code(&next, CodeStatus::Waiting).await? {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Code {} changed while promoting it",
                next.id
            )));
        }
        tx.commit().await?;

        info!(
            queue_id,
            code_id = next.id,
            closed_code_id = ?closed.as_ref().map(|c| c.id),
            "Next code called"
        );

        let next_code = NextCode {
            access_code: next,
            queue,
            closed,
        };
        self.broadcaster.publish(EventName::NextCodeCalled, &next_code);
        Ok(Some(next_code))
    }

    /// The single ATTENDING code of the queue, if any
    pub async fn find_current_code(&self, queue_id: QueueId) -> Result<Option<AccessCode>> {
        let _guard = self.queue_locks.lock(queue_id).await;
        self.current_code_locked(queue_id).await
    }

    async fn current_code_locked(&self, queue_id: QueueId) -> Result<Option<AccessCode>> {
        let mut attending = self
            .store
            .find_codes_by_status(queue_id, CodeStatus::Attending)
            .await?;
        if attending.len() > 1 {
            warn!(queue_id, count = attending.len(), "More than one ATTENDING code");
            return Err(AppError::InvalidState(format!(
                "Queue {} has {} ATTENDING codes",
                queue_id,
                attending.len()
            )));
        }
        Ok(attending.pop())
    }

    /// Snapshot count of WAITING codes (scope per configuration)
    pub async fn remaining_codes(&self, queue_id: QueueId) -> Result<i64> {
        let scope = match self.remaining_scope {
            RemainingScope::PerQueue => Some(queue_id),
            RemainingScope::Global => None,
        };
        self.store
            .count_codes_by_status(scope, CodeStatus::Waiting)
            .await
    }

    /// `n x min_attention_time`, where n is the number of WAITING codes
    /// served before `code` in FIFO order. Zero once the code was called.
    pub async fn calculate_estimated_time(&self, code: &AccessCode) -> Result<Duration> {
        if matches!(code.status, CodeStatus::Attending | CodeStatus::Attended) {
            return Ok(Duration::ZERO);
        }

        let queue = self
            .store
            .find_queue(code.queue_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Queue {} not found", code.queue_id)))?;

        let ahead = self.store.count_waiting_ahead(code).await?;
        let ahead = u32::try_from(ahead.max(0)).unwrap_or(u32::MAX);
        Ok(queue.min_attention_time().saturating_mul(ahead))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewAccessCode, NewQueue, Queue};
    use crate::port::mocks::{InMemoryCodeStore, SteppingClock};
    use crate::port::{AccessCodeRepository, QueueRepository};

    struct Fixture {
        store: InMemoryCodeStore,
        dispatcher: Arc<QueueDispatcher>,
        broadcaster: Arc<EventBroadcaster>,
        queue: Queue,
    }

    async fn fixture(scope: RemainingScope) -> Fixture {
        let store = InMemoryCodeStore::new();
        let queue = store
            .insert_queue(&NewQueue::new("front-desk", 0, 60))
            .await
            .unwrap();
        let broadcaster = Arc::new(EventBroadcaster::new(16));
        let dispatcher = Arc::new(QueueDispatcher::new(
            Arc::new(store.clone()),
            Arc::new(SteppingClock::new(100_000, 1_000)),
            Arc::clone(&broadcaster),
            Arc::new(KeyedLocks::new()),
            scope,
        ));
        Fixture {
            store,
            dispatcher,
            broadcaster,
            queue,
        }
    }

    async fn add_code(store: &InMemoryCodeStore, queue_id: QueueId, created_at: i64) -> AccessCode {
        store
            .insert_code(&NewAccessCode::waiting(queue_id, None, created_at))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_call_next_is_fifo_and_closes_current() {
        let f = fixture(RemainingScope::PerQueue).await;
        let first = add_code(&f.store, f.queue.id, 1_000).await;
        let second = add_code(&f.store, f.queue.id, 2_000).await;

        let called = f.dispatcher.call_next_code(f.queue.id).await.unwrap().unwrap();
        assert_eq!(called.access_code.id, first.id);
        assert_eq!(called.access_code.status, CodeStatus::Attending);
        assert!(called.access_code.attending_at.is_some());
        assert!(called.closed.is_none());
        assert_eq!(called.queue.id, f.queue.id);

        let called = f.dispatcher.call_next_code(f.queue.id).await.unwrap().unwrap();
        assert_eq!(called.access_code.id, second.id);
        let closed = called.closed.unwrap();
        assert_eq!(closed.id, first.id);
        assert_eq!(closed.status, CodeStatus::Attended);

        let stored_first = f.store.find_code(first.id).await.unwrap().unwrap();
        assert_eq!(stored_first.status, CodeStatus::Attended);
        assert!(stored_first.attended_at.is_some());
    }

    #[tokio::test]
    async fn test_ties_broken_by_id() {
        let f = fixture(RemainingScope::PerQueue).await;
        let a = add_code(&f.store, f.queue.id, 5_000).await;
        let _b = add_code(&f.store, f.queue.id, 5_000).await;

        let called = f.dispatcher.call_next_code(f.queue.id).await.unwrap().unwrap();
        assert_eq!(called.access_code.id, a.id);
    }

    #[tokio::test]
    async fn test_empty_queue_returns_none_and_changes_nothing() {
        let f = fixture(RemainingScope::PerQueue).await;
        let mut events = f.broadcaster.subscribe();

        let result = f.dispatcher.call_next_code(f.queue.id).await.unwrap();
        assert!(result.is_none());
        assert!(f.dispatcher.find_current_code(f.queue.id).await.unwrap().is_none());
        assert!(events.try_recv().is_none(), "no event for an empty call");
    }

    #[tokio::test]
    async fn test_last_code_stays_attending_when_queue_drains() {
        let f = fixture(RemainingScope::PerQueue).await;
        let only = add_code(&f.store, f.queue.id, 1_000).await;

        f.dispatcher.call_next_code(f.queue.id).await.unwrap().unwrap();
        assert!(f.dispatcher.call_next_code(f.queue.id).await.unwrap().is_none());

        let current = f.dispatcher.find_current_code(f.queue.id).await.unwrap().unwrap();
        assert_eq!(current.id, only.id);
        assert_eq!(current.status, CodeStatus::Attending);
    }

    #[tokio::test]
    async fn test_unknown_queue_is_not_found() {
        let f = fixture(RemainingScope::PerQueue).await;
        let err = f.dispatcher.call_next_code(999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_call_next_broadcasts_promotion() {
        let f = fixture(RemainingScope::PerQueue).await;
        let code = add_code(&f.store, f.queue.id, 1_000).await;
        let mut events = f.broadcaster.subscribe();

        f.dispatcher.call_next_code(f.queue.id).await.unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.name, EventName::NextCodeCalled);
        assert_eq!(event.payload["access_code"]["id"], code.id);
        assert_eq!(event.payload["access_code"]["status"], "ATTENDING");
    }

    #[tokio::test]
    async fn test_estimated_time_formula() {
        let f = fixture(RemainingScope::PerQueue).await;
        let _t1 = add_code(&f.store, f.queue.id, 1_000).await;
        let _t2 = add_code(&f.store, f.queue.id, 2_000).await;
        let t3 = add_code(&f.store, f.queue.id, 3_000).await;

        let estimate = f.dispatcher.calculate_estimated_time(&t3).await.unwrap();
        assert_eq!(estimate, Duration::from_secs(120));

        f.dispatcher.call_next_code(f.queue.id).await.unwrap();
        let estimate = f.dispatcher.calculate_estimated_time(&t3).await.unwrap();
        assert_eq!(estimate, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_estimated_time_zero_once_called() {
        let f = fixture(RemainingScope::PerQueue).await;
        add_code(&f.store, f.queue.id, 1_000).await;
        let called = f.dispatcher.call_next_code(f.queue.id).await.unwrap().unwrap();

        let estimate = f
            .dispatcher
            .calculate_estimated_time(&called.access_code)
            .await
            .unwrap();
        assert_eq!(estimate, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_estimated_time_unknown_queue() {
        let f = fixture(RemainingScope::PerQueue).await;
        let orphan = NewAccessCode::waiting(404, None, 1_000).into_code(1);
        let err = f.dispatcher.calculate_estimated_time(&orphan).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remaining_codes_scope() {
        let f = fixture(RemainingScope::PerQueue).await;
        let other = f
            .store
            .insert_queue(&NewQueue::new("other", 0, 60))
            .await
            .unwrap();
        add_code(&f.store, f.queue.id, 1_000).await;
        add_code(&f.store, f.queue.id, 2_000).await;
        add_code(&f.store, other.id, 3_000).await;

        assert_eq!(f.dispatcher.remaining_codes(f.queue.id).await.unwrap(), 2);
        f.dispatcher.call_next_code(f.queue.id).await.unwrap();
        assert_eq!(f.dispatcher.remaining_codes(f.queue.id).await.unwrap(), 1);

        let global = QueueDispatcher::new(
            Arc::new(f.store.clone()),
            Arc::new(SteppingClock::fixed(0)),
            Arc::new(EventBroadcaster::default()),
            Arc::new(KeyedLocks::new()),
            RemainingScope::Global,
        );
        assert_eq!(global.remaining_codes(f.queue.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let f = fixture(RemainingScope::PerQueue).await;
        add_code(&f.store, f.queue.id, 1_000).await;
        f.store.set_failing(true);

        let err = f.dispatcher.call_next_code(f.queue.id).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_calls_never_double_promote() {
        let f = fixture(RemainingScope::PerQueue).await;
        for i in 0..20 {
            add_code(&f.store, f.queue.id, 1_000 + i).await;
        }

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..30 {
            let dispatcher = Arc::clone(&f.dispatcher);
            let queue_id = f.queue.id;
            tasks.spawn(async move { dispatcher.call_next_code(queue_id).await });
        }

        let mut promoted = Vec::new();
        while let Some(result) = tasks.join_next().await {
            if let Some(next) = result.unwrap().unwrap() {
                promoted.push(next.access_code.id);
            }
        }

        promoted.sort();
        promoted.dedup();
        assert_eq!(promoted.len(), 20, "every code promoted exactly once");

        let attending = f
            .store
            .count_codes_by_status(Some(f.queue.id), CodeStatus::Attending)
            .await
            .unwrap();
        assert_eq!(attending, 1);
        let attended = f
            .store
            .count_codes_by_status(Some(f.queue.id), CodeStatus::Attended)
            .await
            .unwrap();
        assert_eq!(attended, 19);
    }
}
