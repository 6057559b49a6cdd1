//! RPC Request/Response Types
//!
//! JSON-RPC method parameters and results. Timestamps are epoch milliseconds.

use queuedesk_core::application::constants::DEFAULT_PAGE_SIZE;
use queuedesk_core::application::{CodeStatusCounts, RemainingScope};
use queuedesk_core::domain::{
    AccessCode, AccessCodeComposite, CodeId, CodeSearchCriteria, CodeStatus, NextCode, Page,
    Pageable, Queue, QueueEvent, QueueId,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Shared results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCodeDto {
    pub id: CodeId,
    pub queue_id: QueueId,
    pub visitor_id: Option<String>,
    pub status: CodeStatus,
    pub created_at: i64,
    pub attending_at: Option<i64>,
    pub attended_at: Option<i64>,
}

impl From<AccessCode> for AccessCodeDto {
    fn from(code: AccessCode) -> Self {
        Self {
            id: code.id,
            queue_id: code.queue_id,
            visitor_id: code.visitor_id,
            status: code.status,
            created_at: code.created_at,
            attending_at: code.attending_at,
            attended_at: code.attended_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDto {
    pub id: QueueId,
    pub name: String,
    pub created_at: i64,
    pub started: bool,
    pub min_attention_time_secs: i64,
}

impl From<Queue> for QueueDto {
    fn from(queue: Queue) -> Self {
        Self {
            id: queue.id,
            name: queue.name,
            created_at: queue.created_at,
            started: queue.started,
            min_attention_time_secs: queue.min_attention_time_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCodeCompositeDto {
    pub access_code: AccessCodeDto,
    pub queue: QueueDto,
}

impl From<AccessCodeComposite> for AccessCodeCompositeDto {
    fn from(composite: AccessCodeComposite) -> Self {
        Self {
            access_code: composite.access_code.into(),
            queue: composite.queue.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDto<T> {
    pub content: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_elements: i64,
}

impl<T, D: From<T>> From<Page<T>> for PageDto<D> {
    fn from(page: Page<T>) -> Self {
        Self {
            content: page.content.into_iter().map(D::from).collect(),
            page_number: page.page_number,
            page_size: page.page_size,
            total_elements: page.total_elements,
        }
    }
}

/// Params carrying a record id (`code.get.v1`, `queue.start.v1`, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdRequest {
    pub id: i64,
}

/// Params scoped to one queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueIdRequest {
    pub queue_id: QueueId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: i64,
    pub deleted: bool,
}

// ---------------------------------------------------------------------------
// code.*
// ---------------------------------------------------------------------------

/// code.search.v1 / code.search_composite.v1
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCodesRequest {
    #[serde(default)]
    pub queue_id: Option<QueueId>,
    #[serde(default)]
    pub status: Option<CodeStatus>,
    #[serde(default)]
    pub visitor_id: Option<String>,
    #[serde(default)]
    pub page_number: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl From<SearchCodesRequest> for CodeSearchCriteria {
    fn from(req: SearchCodesRequest) -> Self {
        Self {
            queue_id: req.queue_id,
            status: req.status,
            visitor_id: req.visitor_id,
            pageable: Pageable::new(req.page_number, req.page_size),
        }
    }
}

/// code.resolve_visitor.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveVisitorRequest {
    pub visitor_id: String,
    pub queue_id: QueueId,
}

/// code.call_next.v1 result (`next` is null when nothing was waiting)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallNextResponse {
    pub queue_id: QueueId,
    pub next: Option<NextCodeDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextCodeDto {
    pub access_code: AccessCodeDto,
    pub queue: QueueDto,
    pub closed: Option<AccessCodeDto>,
}

impl From<NextCode> for NextCodeDto {
    fn from(next: NextCode) -> Self {
        Self {
            access_code: next.access_code.into(),
            queue: next.queue.into(),
            closed: next.closed.map(AccessCodeDto::from),
        }
    }
}

/// code.current.v1 result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentCodeResponse {
    pub queue_id: QueueId,
    pub current: Option<AccessCodeDto>,
}

/// code.estimated_time.v1 result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatedTimeResponse {
    pub code_id: CodeId,
    pub status: CodeStatus,
    pub estimated_secs: u64,
}

/// code.remaining.v1 result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingResponse {
    pub queue_id: QueueId,
    pub scope: RemainingScope,
    pub remaining: i64,
}

/// code.create.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCodeParams {
    pub queue_id: QueueId,
    #[serde(default)]
    pub visitor_id: Option<String>,
    #[serde(default)]
    pub status: Option<CodeStatus>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// code.update.v1: absent fields keep their stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCodeParams {
    pub id: CodeId,
    #[serde(default)]
    pub queue_id: Option<QueueId>,
    #[serde(default)]
    pub visitor_id: Option<String>,
    #[serde(default)]
    pub status: Option<CodeStatus>,
    #[serde(default)]
    pub attending_at: Option<i64>,
    #[serde(default)]
    pub attended_at: Option<i64>,
}

impl UpdateCodeParams {
    pub fn apply_to(self, mut code: AccessCode) -> AccessCode {
        if let Some(queue_id) = self.queue_id {
            code.queue_id = queue_id;
        }
        if self.visitor_id.is_some() {
            code.visitor_id = self.visitor_id;
        }
        if let Some(status) = self.status {
            code.status = status;
        }
        if self.attending_at.is_some() {
            code.attending_at = self.attending_at;
        }
        if self.attended_at.is_some() {
            code.attended_at = self.attended_at;
        }
        code
    }
}

// ---------------------------------------------------------------------------
// queue.*
// ---------------------------------------------------------------------------

/// queue.create.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQueueParams {
    pub name: String,
    #[serde(default)]
    pub min_attention_time_secs: Option<i64>,
}

/// queue.update.v1: absent fields keep their stored value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateQueueParams {
    pub id: QueueId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub min_attention_time_secs: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueListResponse {
    pub queues: Vec<QueueDto>,
}

// ---------------------------------------------------------------------------
// admin.* / events.*
// ---------------------------------------------------------------------------

/// admin.stats.v1 result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub queues: i64,
    pub waiting_codes: i64,
    pub attending_codes: i64,
    pub attended_codes: i64,
    pub subscribers: usize,
    pub uptime_seconds: u64,
}

impl StatsResponse {
    pub fn new(queues: usize, counts: CodeStatusCounts, subscribers: usize, uptime_seconds: u64) -> Self {
        Self {
            queues: queues as i64,
            waiting_codes: counts.waiting,
            attending_codes: counts.attending,
            attended_codes: counts.attended,
            subscribers,
            uptime_seconds,
        }
    }
}

/// One `events.notification` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNotification {
    pub name: String,
    pub payload: serde_json::Value,
}

impl From<&QueueEvent> for EventNotification {
    fn from(event: &QueueEvent) -> Self {
        Self {
            name: event.name.as_str().to_string(),
            payload: event.payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuedesk_core::domain::NewAccessCode;

    #[test]
    fn test_search_defaults() {
        let req: SearchCodesRequest = serde_json::from_str(r#"{"queue_id": 3}"#).unwrap();
        let criteria = CodeSearchCriteria::from(req);
        assert_eq!(criteria.queue_id, Some(3));
        assert_eq!(criteria.pageable, Pageable::new(0, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_update_params_overlay() {
        let stored = NewAccessCode::waiting(1, Some("v".into()), 10).into_code(5);
        let params: UpdateCodeParams =
            serde_json::from_str(r#"{"id": 5, "status": "ATTENDING"}"#).unwrap();
        let updated = params.apply_to(stored.clone());

        assert_eq!(updated.status, CodeStatus::Attending);
        assert_eq!(updated.visitor_id, stored.visitor_id);
        assert_eq!(updated.queue_id, 1);
    }
}
