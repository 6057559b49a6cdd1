// SQLite AccessCodeRepository Implementation

use crate::error::map_sqlx_error;
use crate::transaction::SqliteCodeTransaction;
use async_trait::async_trait;
use queuedesk_core::domain::{
    AccessCode, CodeId, CodeSearchCriteria, CodeStatus, NewAccessCode, Page, QueueId,
};
use queuedesk_core::error::{AppError, Result};
use queuedesk_core::port::{AccessCodeRepository, CodeStoreTransaction, TransactionalCodeStore};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// SQLite-backed CodeStore (codes, queues, transactions)
#[derive(Clone)]
pub struct SqliteCodeStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteCodeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl AccessCodeRepository for SqliteCodeStore {
    async fn insert_code(&self, code: &NewAccessCode) -> Result<AccessCode> {
        let row = sqlx::query_as::<_, CodeRow>(
            r#"
            INSERT INTO access_codes (queue_id, visitor_id, status, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(code.queue_id)
        .bind(&code.visitor_id)
        .bind(code.status.as_str())
        .bind(code.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.into_code()
    }

    async fn find_code(&self, id: CodeId) -> Result<Option<AccessCode>> {
        let row = sqlx::query_as::<_, CodeRow>("SELECT * FROM access_codes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(CodeRow::into_code).transpose()
    }

    async fn find_code_by_visitor(&self, visitor_id: &str) -> Result<Option<AccessCode>> {
        let row = sqlx::query_as::<_, CodeRow>("SELECT * FROM access_codes WHERE visitor_id = ?")
            .bind(visitor_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(CodeRow::into_code).transpose()
    }

    async fn find_codes_by_queue(&self, queue_id: QueueId) -> Result<Vec<AccessCode>> {
        let rows: Vec<CodeRow> = sqlx::query_as(
            r#"
            SELECT * FROM access_codes
            WHERE queue_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(queue_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(CodeRow::into_code).collect()
    }

    async fn update_code(&self, code: &AccessCode) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE access_codes
            SET visitor_id = ?, status = ?, attending_at = ?, attended_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&code.visitor_id)
        .bind(code.status.as_str())
        .bind(code.attending_at)
        .bind(code.attended_at)
        .bind(code.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_code(&self, id: CodeId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM access_codes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_next_waiting(&self, queue_id: QueueId) -> Result<Option<AccessCode>> {
        let row = sqlx::query_as::<_, CodeRow>(
            r#"
            SELECT * FROM access_codes
            WHERE queue_id = ? AND status = ?
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(queue_id)
        .bind(CodeStatus::Waiting.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(CodeRow::into_code).transpose()
    }

    async fn find_codes_by_status(
        &self,
        queue_id: QueueId,
        status: CodeStatus,
    ) -> Result<Vec<AccessCode>> {
        let rows: Vec<CodeRow> = sqlx::query_as(
            r#"
            SELECT * FROM access_codes
            WHERE queue_id = ? AND status = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(queue_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(CodeRow::into_code).collect()
    }

    async fn count_codes_by_status(
        &self,
        queue_id: Option<QueueId>,
        status: CodeStatus,
    ) -> Result<i64> {
        let count: i64 = match queue_id {
            Some(queue_id) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM access_codes WHERE queue_id = ? AND status = ?",
                )
                .bind(queue_id)
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM access_codes WHERE status = ?")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn count_waiting_ahead(&self, code: &AccessCode) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM access_codes
            WHERE queue_id = ? AND status = ?
              AND (created_at < ? OR (created_at = ? AND id < ?))
            "#,
        )
        .bind(code.queue_id)
        .bind(CodeStatus::Waiting.as_str())
        .bind(code.created_at)
        .bind(code.created_at)
        .bind(code.id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn search_codes(&self, criteria: &CodeSearchCriteria) -> Result<Page<AccessCode>> {
        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM access_codes");
        push_filters(&mut count_query, criteria);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM access_codes");
        push_filters(&mut select, criteria);
        select
            .push(" ORDER BY created_at ASC, id ASC LIMIT ")
            .push_bind(i64::from(criteria.pageable.page_size))
            .push(" OFFSET ")
            .push_bind(criteria.pageable.offset());
        let rows: Vec<CodeRow> = select
            .build_query_as::<CodeRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let content = rows
            .into_iter()
            .map(CodeRow::into_code)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(content, criteria.pageable, total))
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, criteria: &CodeSearchCriteria) {
    query.push(" WHERE 1 = 1");
    if let Some(queue_id) = criteria.queue_id {
        query.push(" AND queue_id = ").push_bind(queue_id);
    }
    if let Some(status) = criteria.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(visitor_id) = &criteria.visitor_id {
        query.push(" AND visitor_id = ").push_bind(visitor_id.clone());
    }
}

#[async_trait]
impl TransactionalCodeStore for SqliteCodeStore {
    async fn begin_transaction(&self) -> Result<Box<dyn CodeStoreTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqliteCodeTransaction::new(tx)))
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CodeRow {
    id: i64,
    queue_id: i64,
    visitor_id: Option<String>,
    status: String,
    created_at: i64,
    attending_at: Option<i64>,
    attended_at: Option<i64>,
}

impl CodeRow {
    pub(crate) fn into_code(self) -> Result<AccessCode> {
        let status = self.status.parse::<CodeStatus>().map_err(|e| {
            AppError::Database(format!("Corrupt status on access code {}: {}", self.id, e))
        })?;

        Ok(AccessCode {
            id: self.id,
            queue_id: self.queue_id,
            visitor_id: self.visitor_id,
            status,
            created_at: self.created_at,
            attending_at: self.attending_at,
            attended_at: self.attended_at,
        })
    }
}
