// SQLite Transaction Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use queuedesk_core::domain::{AccessCode, CodeStatus, QueueId};
use queuedesk_core::error::Result;
use queuedesk_core::port::{CodeStoreTransaction, Transaction};
use sqlx::{Sqlite, Transaction as SqlxTransaction};

/// Wraps a sqlx transaction; dropping it uncommitted rolls back
pub struct SqliteCodeTransaction {
    tx: SqlxTransaction<'static, Sqlite>,
}

impl SqliteCodeTransaction {
    pub fn new(tx: SqlxTransaction<'static, Sqlite>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Transaction for SqliteCodeTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl CodeStoreTransaction for SqliteCodeTransaction {
    async fn transition_code(&mut self, code: &AccessCode, expected: CodeStatus) -> Result<bool> {
        // Compare-and-swap on the prior status
        let result = sqlx::query(
            r#"
            UPDATE access_codes
            SET status = ?, attending_at = ?, attended_at = ?, visitor_id = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(code.status.as_str())
        .bind(code.attending_at)
        .bind(code.attended_at)
        .bind(&code.visitor_id)
        .bind(code.id)
        .bind(expected.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_queue_started(&mut self, queue_id: QueueId) -> Result<bool> {
        let result = sqlx::query("UPDATE queues SET started = 1 WHERE id = ? AND started = 0")
            .bind(queue_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn reset_codes_to_waiting(&mut self, queue_id: QueueId) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE access_codes
            SET status = ?
            WHERE queue_id = ? AND status NOT IN (?, ?)
            "#,
        )
        .bind(CodeStatus::Waiting.as_str())
        .bind(queue_id)
        .bind(CodeStatus::Attending.as_str())
        .bind(CodeStatus::Attended.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
