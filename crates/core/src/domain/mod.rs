// Domain Layer - Pure business logic and entities

pub mod access_code;
pub mod error;
pub mod event;
pub mod queue;
pub mod search;

// Re-exports
pub use access_code::{AccessCode, AccessCodeComposite, CodeId, CodeStatus, NewAccessCode, NextCode};
pub use error::DomainError;
pub use event::{EventName, QueueEvent};
pub use queue::{NewQueue, Queue, QueueId};
pub use search::{CodeSearchCriteria, Page, Pageable};
