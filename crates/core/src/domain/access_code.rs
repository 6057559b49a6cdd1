// Access Code Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::queue::{Queue, QueueId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Access code ID (assigned by the store)
pub type CodeId = i64;

/// Access Code Status
///
/// Monotonic: WAITING -> ATTENDING -> ATTENDED, no skips, no reversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeStatus {
    Waiting,
    Attending,
    Attended,
}

impl CodeStatus {
    /// True if `next` is the immediate successor of `self`
    pub fn can_transition_to(self, next: CodeStatus) -> bool {
        matches!(
            (self, next),
            (CodeStatus::Waiting, CodeStatus::Attending)
                | (CodeStatus::Attending, CodeStatus::Attended)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CodeStatus::Waiting => "WAITING",
            CodeStatus::Attending => "ATTENDING",
            CodeStatus::Attended => "ATTENDED",
        }
    }
}

impl std::fmt::Display for CodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "WAITING" => Ok(CodeStatus::Waiting),
            "ATTENDING" => Ok(CodeStatus::Attending),
            "ATTENDED" => Ok(CodeStatus::Attended),
            other => Err(DomainError::ValidationError(format!(
                "Unknown access code status: {}",
                other
            ))),
        }
    }
}

/// Access Code Entity (a visitor's ticket)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCode {
    pub id: CodeId,
    pub queue_id: QueueId,
    pub visitor_id: Option<String>,
    pub status: CodeStatus,

    pub created_at: i64, // epoch ms
    pub attending_at: Option<i64>,
    pub attended_at: Option<i64>,
}

impl AccessCode {
    /// Promote: WAITING -> ATTENDING with explicit timestamp
    pub fn attend(&mut self, now_millis: i64) -> Result<()> {
        self.transition(CodeStatus::Attending)?;
        self.attending_at = Some(now_millis);
        Ok(())
    }

    /// Close: ATTENDING -> ATTENDED with explicit timestamp
    pub fn close(&mut self, now_millis: i64) -> Result<()> {
        self.transition(CodeStatus::Attended)?;
        self.attended_at = Some(now_millis);
        Ok(())
    }

    fn transition(&mut self, next: CodeStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// FIFO order: oldest `created_at` first, ties broken by smallest id
    pub fn fifo_cmp(&self, other: &AccessCode) -> Ordering {
        (self.created_at, self.id).cmp(&(other.created_at, other.id))
    }

    /// True if this code is served before `other` in FIFO order
    pub fn is_ahead_of(&self, other: &AccessCode) -> bool {
        self.fifo_cmp(other) == Ordering::Less
    }
}

/// Fields for an access code that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccessCode {
    pub queue_id: QueueId,
    pub visitor_id: Option<String>,
    pub status: CodeStatus,
    pub created_at: i64,
}

impl NewAccessCode {
    /// A fresh WAITING code
    pub fn waiting(queue_id: QueueId, visitor_id: Option<String>, created_at: i64) -> Self {
        Self {
            queue_id,
            visitor_id,
            status: CodeStatus::Waiting,
            created_at,
        }
    }

    /// Materialize with the id assigned by the store
    pub fn into_code(self, id: CodeId) -> AccessCode {
        AccessCode {
            id,
            queue_id: self.queue_id,
            visitor_id: self.visitor_id,
            status: self.status,
            created_at: self.created_at,
            attending_at: None,
            attended_at: None,
        }
    }
}

/// Access code together with the queue it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCodeComposite {
    pub access_code: AccessCode,
    pub queue: Queue,
}

/// Result of calling the next code of a queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextCode {
    /// The promoted code (now ATTENDING)
    pub access_code: AccessCode,
    pub queue: Queue,
    /// The previously ATTENDING code, now ATTENDED
    pub closed: Option<AccessCode>,
}
