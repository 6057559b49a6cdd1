// Queue Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Queue identifier (assigned by the store)
pub type QueueId = i64;

/// Queue Entity
///
/// `started` goes false -> true exactly once; only the queue lifecycle service
/// flips it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    pub id: QueueId,
    pub name: String,
    pub created_at: i64, // epoch ms
    pub started: bool,
    pub min_attention_time_secs: i64,
}

impl Queue {
    /// Minimum time an attended code is expected to take
    pub fn min_attention_time(&self) -> Duration {
        Duration::from_secs(self.min_attention_time_secs.max(0) as u64)
    }

    /// Transition to started (false -> true only)
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(DomainError::InvalidStateTransition {
                from: "STARTED".to_string(),
                to: "STARTED".to_string(),
            });
        }
        self.started = true;
        Ok(())
    }
}

/// Fields for a queue that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQueue {
    pub name: String,
    pub created_at: i64,
    pub min_attention_time_secs: i64,
}

impl NewQueue {
    /// Create a not-started queue with explicit creation timestamp
    pub fn new(name: impl Into<String>, created_at: i64, min_attention_time_secs: i64) -> Self {
        Self {
            name: name.into(),
            created_at,
            min_attention_time_secs,
        }
    }

    /// Materialize with the id assigned by the store
    pub fn into_queue(self, id: QueueId) -> Queue {
        Queue {
            id,
            name: self.name,
            created_at: self.created_at,
            started: false,
            min_attention_time_secs: self.min_attention_time_secs,
        }
    }
}
