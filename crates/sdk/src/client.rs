//! QueueDesk Client Implementation

use crate::error::{Result, SdkError};
use crate::types::{
    AccessCode, AccessCodeComposite, CallNextResponse, CreateCodeRequest, CreateQueueRequest,
    CurrentCodeResponse, DeleteResponse, EstimatedTimeResponse, EventNotification, IdRequest,
    Page, Queue, QueueIdRequest, QueueListResponse, RemainingResponse, ResolveVisitorRequest,
    SearchCodesRequest, StatsResponse, UpdateCodeRequest, UpdateQueueRequest,
};
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SUBSCRIBE_METHOD: &str = "events.subscribe.v1";
const UNSUBSCRIBE_METHOD: &str = "events.unsubscribe.v1";

/// QueueDesk daemon client over HTTP
///
/// # Example
///
/// ```no_run
/// use queuedesk_sdk::QueueDeskClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = QueueDeskClient::connect("http://127.0.0.1:9530").await?;
/// let queue = client.create_queue("front-desk", None).await?;
/// let code = client.resolve_visitor("visitor-1", queue.id).await?;
/// println!("Your code: {}", code.id);
/// # Ok(())
/// # }
/// ```
pub struct QueueDeskClient {
    client: HttpClient,
}

impl QueueDeskClient {
    /// Connect to the daemon, e.g. `http://127.0.0.1:9530`
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref();

        let client = HttpClientBuilder::default()
            .request_timeout(REQUEST_TIMEOUT)
            .build(url)
            .map_err(|e| SdkError::Connection(format!("Failed to create client: {}", e)))?;

        Ok(Self { client })
    }

    async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: &P) -> Result<R> {
        let response = self.client.request(method, object_params(params)?).await?;
        Ok(response)
    }

    // code.*

    pub async fn get_code(&self, id: i64) -> Result<AccessCode> {
        self.call("code.get.v1", &IdRequest { id }).await
    }

    pub async fn get_code_composite(&self, id: i64) -> Result<AccessCodeComposite> {
        self.call("code.get_composite.v1", &IdRequest { id }).await
    }

    pub async fn search_codes(&self, request: SearchCodesRequest) -> Result<Page<AccessCode>> {
        self.call("code.search.v1", &request).await
    }

    pub async fn search_code_composites(
        &self,
        request: SearchCodesRequest,
    ) -> Result<Page<AccessCodeComposite>> {
        self.call("code.search_composite.v1", &request).await
    }

    /// The visitor's code, created on the first call
    pub async fn resolve_visitor(
        &self,
        visitor_id: impl Into<String>,
        queue_id: i64,
    ) -> Result<AccessCode> {
        let request = ResolveVisitorRequest {
            visitor_id: visitor_id.into(),
            queue_id,
        };
        self.call("code.resolve_visitor.v1", &request).await
    }

    /// Close the attending code and attend the oldest waiting one
    pub async fn call_next(&self, queue_id: i64) -> Result<CallNextResponse> {
        self.call("code.call_next.v1", &QueueIdRequest { queue_id })
            .await
    }

    pub async fn current_code(&self, queue_id: i64) -> Result<CurrentCodeResponse> {
        self.call("code.current.v1", &QueueIdRequest { queue_id })
            .await
    }

    pub async fn estimated_time(&self, code_id: i64) -> Result<EstimatedTimeResponse> {
        self.call("code.estimated_time.v1", &IdRequest { id: code_id })
            .await
    }

    pub async fn remaining(&self, queue_id: i64) -> Result<RemainingResponse> {
        self.call("code.remaining.v1", &QueueIdRequest { queue_id })
            .await
    }

    pub async fn create_code(&self, request: CreateCodeRequest) -> Result<AccessCode> {
        self.call("code.create.v1", &request).await
    }

    pub async fn update_code(&self, request: UpdateCodeRequest) -> Result<AccessCode> {
        self.call("code.update.v1", &request).await
    }

    pub async fn delete_code(&self, id: i64) -> Result<DeleteResponse> {
        self.call("code.delete.v1", &IdRequest { id }).await
    }

    // queue.*

    pub async fn get_queue(&self, id: i64) -> Result<Queue> {
        self.call("queue.get.v1", &IdRequest { id }).await
    }

    pub async fn list_queues(&self) -> Result<Vec<Queue>> {
        let response: QueueListResponse = self.client.request("queue.list.v1", rpc_params![]).await?;
        Ok(response.queues)
    }

    pub async fn create_queue(
        &self,
        name: impl Into<String>,
        min_attention_time_secs: Option<i64>,
    ) -> Result<Queue> {
        let request = CreateQueueRequest {
            name: name.into(),
            min_attention_time_secs,
        };
        self.call("queue.create.v1", &request).await
    }

    pub async fn update_queue(&self, request: UpdateQueueRequest) -> Result<Queue> {
        self.call("queue.update.v1", &request).await
    }

    pub async fn delete_queue(&self, id: i64) -> Result<DeleteResponse> {
        self.call("queue.delete.v1", &IdRequest { id }).await
    }

    /// Open the queue; codes left attending from a previous session go back to waiting
    pub async fn start_queue(&self, id: i64) -> Result<Queue> {
        self.call("queue.start.v1", &IdRequest { id }).await
    }

    // admin.*

    pub async fn stats(&self) -> Result<StatsResponse> {
        let stats = self.client.request("admin.stats.v1", rpc_params![]).await?;
        Ok(stats)
    }
}

/// Live queue events over WebSocket
///
/// Dropping the stream unsubscribes.
pub struct EventStream {
    subscription: Subscription<EventNotification>,
    _client: WsClient,
}

impl EventStream {
    /// Subscribe at a WebSocket endpoint, e.g. `ws://127.0.0.1:9530`
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref();
        let client = WsClientBuilder::default()
            .request_timeout(REQUEST_TIMEOUT)
            .build(url)
            .await
            .map_err(|e| SdkError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        let subscription = client
            .subscribe(SUBSCRIBE_METHOD, rpc_params![], UNSUBSCRIBE_METHOD)
            .await?;

        Ok(Self {
            subscription,
            _client: client,
        })
    }

    /// Next event; `None` once the daemon closes the subscription
    pub async fn next(&mut self) -> Option<Result<EventNotification>> {
        self.subscription
            .next()
            .await
            .map(|event| event.map_err(SdkError::from))
    }
}

/// Named params from a serializable struct
fn object_params<T: Serialize>(value: &T) -> Result<ObjectParams> {
    let mut params = ObjectParams::new();
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                params.insert(&key, value)?;
            }
        }
        other => {
            return Err(SdkError::Other(format!(
                "Request params must be an object, got {}",
                other
            )))
        }
    }
    Ok(params)
}
