// Port Layer - Interfaces for external dependencies

pub mod code_repository;
pub mod mocks; // In-memory store and clocks for tests
pub mod queue_repository;
pub mod time_provider;
pub mod transaction;

// Re-exports
pub use code_repository::AccessCodeRepository;
pub use queue_repository::QueueRepository;
pub use time_provider::TimeProvider;
pub use transaction::{CodeStoreTransaction, Transaction, TransactionalCodeStore};

/// The narrow storage contract the core consumes: code + queue records
/// plus conditional transactional updates.
pub trait CodeStore: AccessCodeRepository + QueueRepository + TransactionalCodeStore {}

impl<T> CodeStore for T where T: AccessCodeRepository + QueueRepository + TransactionalCodeStore {}
