// SQLite QueueRepository Implementation

use crate::code_repository::SqliteCodeStore;
use crate::error::map_sqlx_error;
use async_trait::async_trait;
use queuedesk_core::domain::{NewQueue, Queue, QueueId};
use queuedesk_core::error::Result;
use queuedesk_core::port::QueueRepository;

#[async_trait]
impl QueueRepository for SqliteCodeStore {
    async fn insert_queue(&self, queue: &NewQueue) -> Result<Queue> {
        let row = sqlx::query_as::<_, QueueRow>(
            r#"
            INSERT INTO queues (name, created_at, started, min_attention_time_secs)
            VALUES (?, ?, 0, ?)
            RETURNING *
            "#,
        )
        .bind(&queue.name)
        .bind(queue.created_at)
        .bind(queue.min_attention_time_secs)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into_queue())
    }

    async fn find_queue(&self, id: QueueId) -> Result<Option<Queue>> {
        let row = sqlx::query_as::<_, QueueRow>("SELECT * FROM queues WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(QueueRow::into_queue))
    }

    async fn find_all_queues(&self) -> Result<Vec<Queue>> {
        let rows: Vec<QueueRow> = sqlx::query_as("SELECT * FROM queues ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(QueueRow::into_queue).collect())
    }

    async fn update_queue(&self, queue: &Queue) -> Result<bool> {
        // `started` is owned by the lifecycle transaction, never written here
        let result = sqlx::query(
            r#"
            UPDATE queues
            SET name = ?, min_attention_time_secs = ?
            WHERE id = ?
            "#,
        )
        .bind(&queue.name)
        .bind(queue.min_attention_time_secs)
        .bind(queue.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_queue(&self, id: QueueId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM queues WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct QueueRow {
    id: i64,
    name: String,
    created_at: i64,
    started: bool,
    min_attention_time_secs: i64,
}

impl QueueRow {
    fn into_queue(self) -> Queue {
        Queue {
            id: self.id,
            name: self.name,
            created_at: self.created_at,
            started: self.started,
            min_attention_time_secs: self.min_attention_time_secs,
        }
    }
}
