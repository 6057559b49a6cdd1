//! SDK Request/Response Types
//!
//! Mirrors the JSON-RPC types from api-rpc crate.

use serde::{Deserialize, Serialize};

/// Access code as returned by the daemon
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessCode {
    pub id: i64,
    pub queue_id: i64,
    pub visitor_id: Option<String>,
    /// `WAITING`, `ATTENDING` or `ATTENDED`
    pub status: String,
    pub created_at: i64,
    pub attending_at: Option<i64>,
    pub attended_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Queue {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
    pub started: bool,
    pub min_attention_time_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessCodeComposite {
    pub access_code: AccessCode,
    pub queue: Queue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_elements: i64,
}

/// Search filters; `None` fields are not sent
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchCodesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateCodeRequest {
    pub queue_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

/// Partial update; only the fields set are changed
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateCodeRequest {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attending_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attended_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateQueueRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_attention_time_secs: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateQueueRequest {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_attention_time_secs: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextCode {
    pub access_code: AccessCode,
    pub queue: Queue,
    /// The code that was attending before this call, now attended
    pub closed: Option<AccessCode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallNextResponse {
    pub queue_id: i64,
    pub next: Option<NextCode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentCodeResponse {
    pub queue_id: i64,
    pub current: Option<AccessCode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstimatedTimeResponse {
    pub code_id: i64,
    pub status: String,
    pub estimated_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemainingResponse {
    pub queue_id: i64,
    /// `per_queue` or `global`
    pub scope: String,
    pub remaining: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteResponse {
    pub id: i64,
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QueueListResponse {
    pub queues: Vec<Queue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsResponse {
    pub queues: i64,
    pub waiting_codes: i64,
    pub attending_codes: i64,
    pub attended_codes: i64,
    pub subscribers: usize,
    pub uptime_seconds: u64,
}

/// Queue event pushed over the WebSocket subscription
#[derive(Debug, Clone, Deserialize)]
pub struct EventNotification {
    /// `NEW_CODE_ADDED`, `NEXT_CODE_CALLED` or `QUEUE_STARTED`
    pub name: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct IdRequest {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QueueIdRequest {
    pub queue_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResolveVisitorRequest {
    pub visitor_id: String,
    pub queue_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_optional_fields_are_omitted() {
        let value = serde_json::to_value(SearchCodesRequest {
            queue_id: Some(3),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(value, json!({"queue_id": 3}));

        let value = serde_json::to_value(UpdateCodeRequest {
            id: 9,
            status: Some("ATTENDED".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(value, json!({"id": 9, "status": "ATTENDED"}));
    }

    #[test]
    fn test_call_next_response_parses_daemon_payload() {
        let payload = json!({
            "queue_id": 1,
            "next": {
                "access_code": {
                    "id": 2, "queue_id": 1, "visitor_id": null, "status": "ATTENDING",
                    "created_at": 10, "attending_at": 20, "attended_at": null
                },
                "queue": {
                    "id": 1, "name": "desk", "created_at": 1, "started": true,
                    "min_attention_time_secs": 60
                },
                "closed": null
            }
        });

        let response: CallNextResponse = serde_json::from_value(payload).unwrap();
        let next = response.next.unwrap();
        assert_eq!(next.access_code.status, "ATTENDING");
        assert_eq!(next.queue.name, "desk");
        assert!(next.closed.is_none());
    }
}
