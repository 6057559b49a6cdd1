// QueueDesk Infrastructure - SQLite Adapter
// Implements: AccessCodeRepository, QueueRepository, TransactionalCodeStore

mod code_repository;
mod connection;
mod error;
mod migration;
mod queue_repository;
mod transaction;

pub use code_repository::SqliteCodeStore;
pub use connection::create_pool;
pub use migration::run_migrations;
pub use transaction::SqliteCodeTransaction;

use queuedesk_core::error::Result;

/// Open (or create) the database and bring its schema up to date
pub async fn open_store(database_url: &str) -> Result<SqliteCodeStore> {
    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;
    Ok(SqliteCodeStore::new(pool))
}
