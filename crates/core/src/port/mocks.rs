// ============================================================================
// Mock Implementations for Testing
// ============================================================================
//
// In-memory CodeStore with the same constraints the SQLite schema enforces:
// unique visitor_id, one ATTENDING code per queue, code -> queue reference,
// restrict-on-delete for queues that still have codes.

use crate::domain::{
    AccessCode, CodeId, CodeSearchCriteria, CodeStatus, NewAccessCode, NewQueue, Page, Queue,
    QueueId,
};
use crate::error::{AppError, Result};
use crate::port::{
    AccessCodeRepository, CodeStoreTransaction, QueueRepository, TimeProvider, Transaction,
    TransactionalCodeStore,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default, Clone)]
struct State {
    queues: BTreeMap<QueueId, Queue>,
    codes: BTreeMap<CodeId, AccessCode>,
    last_queue_id: i64,
    last_code_id: i64,
}

impl State {
    fn fifo(&self, filter: impl Fn(&AccessCode) -> bool) -> Vec<AccessCode> {
        let mut codes: Vec<AccessCode> = self.codes.values().filter(|c| filter(c)).cloned().collect();
        codes.sort_by(|a, b| a.fifo_cmp(b));
        codes
    }

    fn check_single_attending(&self, code: &AccessCode) -> Result<()> {
        if code.status != CodeStatus::Attending {
            return Ok(());
        }
        let other = self.codes.values().any(|c| {
            c.queue_id == code.queue_id && c.id != code.id && c.status == CodeStatus::Attending
        });
        if other {
            return Err(AppError::Conflict(format!(
                "Queue {} already has an ATTENDING code",
                code.queue_id
            )));
        }
        Ok(())
    }

    fn write_code(&mut self, code: &AccessCode) -> Result<bool> {
        let Some(stored) = self.codes.get(&code.id) else {
            return Ok(false);
        };
        if let Some(visitor) = &code.visitor_id {
            let taken = self
                .codes
                .values()
                .any(|c| c.id != code.id && c.visitor_id.as_deref() == Some(visitor.as_str()));
            if taken {
                return Err(AppError::Conflict(format!("Visitor {} already has a code", visitor)));
            }
        }
        self.check_single_attending(code)?;

        let mut updated = code.clone();
        updated.queue_id = stored.queue_id;
        updated.created_at = stored.created_at;
        self.codes.insert(code.id, updated);
        Ok(true)
    }
}

/// In-memory store implementing every CodeStore port
#[derive(Clone, Default)]
pub struct InMemoryCodeStore {
    state: Arc<Mutex<State>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `AppError::Database`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Database("injected store failure".to_string()));
        }
        Ok(())
    }

    async fn state(&self) -> Result<tokio::sync::MutexGuard<'_, State>> {
        self.check_available()?;
        Ok(self.state.lock().await)
    }
}

#[async_trait]
impl AccessCodeRepository for InMemoryCodeStore {
    async fn insert_code(&self, code: &NewAccessCode) -> Result<AccessCode> {
        let mut state = self.state().await?;
        if !state.queues.contains_key(&code.queue_id) {
            return Err(AppError::Conflict(format!(
                "Foreign key violation: queue {} does not exist",
                code.queue_id
            )));
        }
        if let Some(visitor) = &code.visitor_id {
            if state.codes.values().any(|c| c.visitor_id.as_ref() == Some(visitor)) {
                return Err(AppError::Conflict(format!("Visitor {} already has a code", visitor)));
            }
        }

        state.last_code_id += 1;
        let created = code.clone().into_code(state.last_code_id);
        state.check_single_attending(&created)?;
        state.codes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_code(&self, id: CodeId) -> Result<Option<AccessCode>> {
        Ok(self.state().await?.codes.get(&id).cloned())
    }

    async fn find_code_by_visitor(&self, visitor_id: &str) -> Result<Option<AccessCode>> {
        let state = self.state().await?;
        Ok(state
            .codes
            .values()
            .find(|c| c.visitor_id.as_deref() == Some(visitor_id))
            .cloned())
    }

    async fn find_codes_by_queue(&self, queue_id: QueueId) -> Result<Vec<AccessCode>> {
        Ok(self.state().await?.fifo(|c| c.queue_id == queue_id))
    }

    async fn update_code(&self, code: &AccessCode) -> Result<bool> {
        self.state().await?.write_code(code)
    }

    async fn delete_code(&self, id: CodeId) -> Result<bool> {
        Ok(self.state().await?.codes.remove(&id).is_some())
    }

    async fn find_next_waiting(&self, queue_id: QueueId) -> Result<Option<AccessCode>> {
        let state = self.state().await?;
        Ok(state
            .fifo(|c| c.queue_id == queue_id && c.status == CodeStatus::Waiting)
            .into_iter()
            .next())
    }

    async fn find_codes_by_status(
        &self,
        queue_id: QueueId,
        status: CodeStatus,
    ) -> Result<Vec<AccessCode>> {
        Ok(self
            .state()
            .await?
            .fifo(|c| c.queue_id == queue_id && c.status == status))
    }

    async fn count_codes_by_status(
        &self,
        queue_id: Option<QueueId>,
        status: CodeStatus,
    ) -> Result<i64> {
        let state = self.state().await?;
        let count = state
            .codes
            .values()
            .filter(|c| c.status == status && queue_id.map_or(true, |q| c.queue_id == q))
            .count();
        Ok(count as i64)
    }

    async fn count_waiting_ahead(&self, code: &AccessCode) -> Result<i64> {
        let state = self.state().await?;
        let count = state
            .codes
            .values()
            .filter(|c| {
                c.queue_id == code.queue_id
                    && c.status == CodeStatus::Waiting
                    && c.is_ahead_of(code)
            })
            .count();
        Ok(count as i64)
    }

    async fn search_codes(&self, criteria: &CodeSearchCriteria) -> Result<Page<AccessCode>> {
        let state = self.state().await?;
        let matches = state.fifo(|c| {
            criteria.queue_id.map_or(true, |q| c.queue_id == q)
                && criteria.status.map_or(true, |s| c.status == s)
                && criteria
                    .visitor_id
                    .as_deref()
                    .map_or(true, |v| c.visitor_id.as_deref() == Some(v))
        });
        let total = matches.len() as i64;
        let content = matches
            .into_iter()
            .skip(criteria.pageable.offset() as usize)
            .take(criteria.pageable.page_size as usize)
            .collect();
        Ok(Page::new(content, criteria.pageable, total))
    }
}

#[async_trait]
impl QueueRepository for InMemoryCodeStore {
    async fn insert_queue(&self, queue: &NewQueue) -> Result<Queue> {
        let mut state = self.state().await?;
        state.last_queue_id += 1;
        let created = queue.clone().into_queue(state.last_queue_id);
        state.queues.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_queue(&self, id: QueueId) -> Result<Option<Queue>> {
        Ok(self.state().await?.queues.get(&id).cloned())
    }

    async fn find_all_queues(&self) -> Result<Vec<Queue>> {
        Ok(self.state().await?.queues.values().cloned().collect())
    }

    async fn update_queue(&self, queue: &Queue) -> Result<bool> {
        let mut state = self.state().await?;
        match state.queues.get_mut(&queue.id) {
            Some(stored) => {
                stored.name = queue.name.clone();
                stored.min_attention_time_secs = queue.min_attention_time_secs;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_queue(&self, id: QueueId) -> Result<bool> {
        let mut state = self.state().await?;
        if state.codes.values().any(|c| c.queue_id == id) {
            return Err(AppError::Conflict(format!(
                "Foreign key violation: queue {} still has access codes",
                id
            )));
        }
        Ok(state.queues.remove(&id).is_some())
    }
}

#[async_trait]
impl TransactionalCodeStore for InMemoryCodeStore {
    async fn begin_transaction(&self) -> Result<Box<dyn CodeStoreTransaction>> {
        self.check_available()?;
        let guard = Arc::clone(&self.state).lock_owned().await;
        let backup = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard: Some(guard),
            backup,
        }))
    }
}

/// Holds the store lock for its whole lifetime; restores the snapshot unless committed
struct InMemoryTransaction {
    guard: Option<OwnedMutexGuard<State>>,
    backup: State,
}

impl InMemoryTransaction {
    fn state(&mut self) -> Result<&mut State> {
        self.guard
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("transaction already finished".to_string()))
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if let Some(mut guard) = self.guard.take() {
            *guard = std::mem::take(&mut self.backup);
        }
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.guard.take();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        // Drop restores the snapshot
        Ok(())
    }
}

#[async_trait]
impl CodeStoreTransaction for InMemoryTransaction {
    async fn transition_code(&mut self, code: &AccessCode, expected: CodeStatus) -> Result<bool> {
        let state = self.state()?;
        let current = state.codes.get(&code.id).map(|stored| stored.status);
        if current != Some(expected) {
            return Ok(false);
        }
        state.write_code(code)
    }

    async fn mark_queue_started(&mut self, queue_id: QueueId) -> Result<bool> {
        let state = self.state()?;
        match state.queues.get_mut(&queue_id) {
            Some(queue) if !queue.started => {
                queue.started = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reset_codes_to_waiting(&mut self, queue_id: QueueId) -> Result<u64> {
        let state = self.state()?;
        let mut count = 0;
        for code in state.codes.values_mut() {
            if code.queue_id == queue_id
                && !matches!(code.status, CodeStatus::Attending | CodeStatus::Attended)
            {
                code.status = CodeStatus::Waiting;
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Clock that advances by a fixed step on every read
pub struct SteppingClock {
    now: AtomicI64,
    step: i64,
}

impl SteppingClock {
    pub fn new(start_millis: i64, step_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
            step: step_millis,
        }
    }

    /// A clock that never advances
    pub fn fixed(millis: i64) -> Self {
        Self::new(millis, 0)
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl TimeProvider for SteppingClock {
    fn now_millis(&self) -> i64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}
