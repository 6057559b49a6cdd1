//! RPC Method Handlers
//!
//! Thin translation between JSON-RPC params and the application services.

use crate::error::to_rpc_error;
use crate::types::{
    AccessCodeCompositeDto, AccessCodeDto, CallNextResponse, CreateCodeParams, CreateQueueParams,
    CurrentCodeResponse, DeleteResponse, EstimatedTimeResponse, EventNotification, IdRequest,
    PageDto, QueueDto, QueueIdRequest, QueueListResponse, RemainingResponse,
    ResolveVisitorRequest, SearchCodesRequest, StatsResponse, UpdateCodeParams,
    UpdateQueueParams,
};
use jsonrpsee::core::SubscriptionResult;
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::{PendingSubscriptionSink, SubscriptionMessage};
use queuedesk_core::application::{CreateCodeRequest, CreateQueueRequest, QueueDeskServices};
use queuedesk_core::domain::CodeSearchCriteria;
use std::time::Instant;
use tracing::{debug, info};

type RpcResult<T> = Result<T, ErrorObjectOwned>;

/// RPC Handler with injected services
pub struct RpcHandler {
    services: QueueDeskServices,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(services: QueueDeskServices) -> Self {
        Self {
            services,
            start_time: Instant::now(),
        }
    }

    // -- code.* --------------------------------------------------------------

    /// code.get.v1
    pub async fn get_code(&self, req: IdRequest) -> RpcResult<AccessCodeDto> {
        let code = self.services.codes.get_code(req.id).await.map_err(to_rpc_error)?;
        Ok(code.into())
    }

    /// code.get_composite.v1
    pub async fn get_code_composite(&self, req: IdRequest) -> RpcResult<AccessCodeCompositeDto> {
        let composite = self
            .services
            .codes
            .get_code_composite(req.id)
            .await
            .map_err(to_rpc_error)?;
        Ok(composite.into())
    }

    /// code.search.v1
    pub async fn search_codes(&self, req: SearchCodesRequest) -> RpcResult<PageDto<AccessCodeDto>> {
        let criteria = CodeSearchCriteria::from(req);
        let page = self
            .services
            .codes
            .search_codes(&criteria)
            .await
            .map_err(to_rpc_error)?;
        Ok(page.into())
    }

    /// code.search_composite.v1
    pub async fn search_code_composites(
        &self,
        req: SearchCodesRequest,
    ) -> RpcResult<PageDto<AccessCodeCompositeDto>> {
        let criteria = CodeSearchCriteria::from(req);
        let page = self
            .services
            .codes
            .search_code_composites(&criteria)
            .await
            .map_err(to_rpc_error)?;
        Ok(page.into())
    }

    /// code.resolve_visitor.v1
    pub async fn resolve_visitor(&self, req: ResolveVisitorRequest) -> RpcResult<AccessCodeDto> {
        let code = self
            .services
            .resolver
            .resolve_by_visitor(&req.visitor_id, req.queue_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(code.into())
    }

    /// code.call_next.v1
    pub async fn call_next(&self, req: QueueIdRequest) -> RpcResult<CallNextResponse> {
        let next = self
            .services
            .dispatcher
            .call_next_code(req.queue_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(CallNextResponse {
            queue_id: req.queue_id,
            next: next.map(Into::into),
        })
    }

    /// code.current.v1
    pub async fn current_code(&self, req: QueueIdRequest) -> RpcResult<CurrentCodeResponse> {
        let current = self
            .services
            .dispatcher
            .find_current_code(req.queue_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(CurrentCodeResponse {
            queue_id: req.queue_id,
            current: current.map(Into::into),
        })
    }

    /// code.estimated_time.v1
    pub async fn estimated_time(&self, req: IdRequest) -> RpcResult<EstimatedTimeResponse> {
        let code = self.services.codes.get_code(req.id).await.map_err(to_rpc_error)?;
        let estimate = self
            .services
            .dispatcher
            .calculate_estimated_time(&code)
            .await
            .map_err(to_rpc_error)?;
        Ok(EstimatedTimeResponse {
            code_id: code.id,
            status: code.status,
            estimated_secs: estimate.as_secs(),
        })
    }

    /// code.remaining.v1
    pub async fn remaining(&self, req: QueueIdRequest) -> RpcResult<RemainingResponse> {
        let remaining = self
            .services
            .dispatcher
            .remaining_codes(req.queue_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(RemainingResponse {
            queue_id: req.queue_id,
            scope: self.services.remaining_scope,
            remaining,
        })
    }

    /// code.create.v1
    pub async fn create_code(&self, req: CreateCodeParams) -> RpcResult<AccessCodeDto> {
        let code = self
            .services
            .codes
            .create_code(CreateCodeRequest {
                queue_id: req.queue_id,
                visitor_id: req.visitor_id,
                status: req.status,
                created_at: req.created_at,
            })
            .await
            .map_err(to_rpc_error)?;
        Ok(code.into())
    }

    /// code.update.v1
    pub async fn update_code(&self, req: UpdateCodeParams) -> RpcResult<AccessCodeDto> {
        let stored = self.services.codes.get_code(req.id).await.map_err(to_rpc_error)?;
        let updated = self
            .services
            .codes
            .update_code(req.apply_to(stored))
            .await
            .map_err(to_rpc_error)?;
        Ok(updated.into())
    }

    /// code.delete.v1
    pub async fn delete_code(&self, req: IdRequest) -> RpcResult<DeleteResponse> {
        let deleted = self
            .services
            .codes
            .delete_code(req.id)
            .await
            .map_err(to_rpc_error)?;
        Ok(DeleteResponse { id: req.id, deleted })
    }

    // -- queue.* -------------------------------------------------------------

    /// queue.get.v1
    pub async fn get_queue(&self, req: IdRequest) -> RpcResult<QueueDto> {
        let queue = self.services.queues.get_queue(req.id).await.map_err(to_rpc_error)?;
        Ok(queue.into())
    }

    /// queue.list.v1
    pub async fn list_queues(&self) -> RpcResult<QueueListResponse> {
        let queues = self.services.queues.list_queues().await.map_err(to_rpc_error)?;
        Ok(QueueListResponse {
            queues: queues.into_iter().map(Into::into).collect(),
        })
    }

    /// queue.create.v1
    pub async fn create_queue(&self, req: CreateQueueParams) -> RpcResult<QueueDto> {
        let queue = self
            .services
            .queues
            .create_queue(CreateQueueRequest {
                name: req.name,
                min_attention_time_secs: req.min_attention_time_secs,
            })
            .await
            .map_err(to_rpc_error)?;
        Ok(queue.into())
    }

    /// queue.update.v1
    pub async fn update_queue(&self, req: UpdateQueueParams) -> RpcResult<QueueDto> {
        let mut queue = self.services.queues.get_queue(req.id).await.map_err(to_rpc_error)?;
        if let Some(name) = req.name {
            queue.name = name;
        }
        if let Some(min) = req.min_attention_time_secs {
            queue.min_attention_time_secs = min;
        }
        let updated = self
            .services
            .queues
            .update_queue(queue)
            .await
            .map_err(to_rpc_error)?;
        Ok(updated.into())
    }

    /// queue.delete.v1
    pub async fn delete_queue(&self, req: IdRequest) -> RpcResult<DeleteResponse> {
        let deleted = self
            .services
            .queues
            .delete_queue(req.id)
            .await
            .map_err(to_rpc_error)?;
        Ok(DeleteResponse { id: req.id, deleted })
    }

    /// queue.start.v1
    pub async fn start_queue(&self, req: IdRequest) -> RpcResult<QueueDto> {
        let queue = self
            .services
            .lifecycle
            .start_queue(req.id)
            .await
            .map_err(to_rpc_error)?;
        Ok(queue.into())
    }

    // -- admin.* -------------------------------------------------------------

    /// admin.stats.v1
    pub async fn stats(&self) -> RpcResult<StatsResponse> {
        let queues = self.services.queues.list_queues().await.map_err(to_rpc_error)?;
        let counts = self.services.codes.status_counts().await.map_err(to_rpc_error)?;

        Ok(StatsResponse::new(
            queues.len(),
            counts,
            self.services.broadcaster.subscriber_count(),
            self.start_time.elapsed().as_secs(),
        ))
    }

    // -- events.* ------------------------------------------------------------

    /// events.subscribe.v1
    ///
    /// Holds one broadcaster subscriber for as long as the client stays
    /// connected. Ends when the client goes away or the broadcaster drops the
    /// subscriber (buffer full).
    pub async fn stream_events(&self, pending: PendingSubscriptionSink) -> SubscriptionResult {
        // Register before accepting so no event after the accept is missed
        let broadcaster = &self.services.broadcaster;
        let mut subscription = broadcaster.subscribe();
        let subscriber_id = subscription.id();
        let sink = match pending.accept().await {
            Ok(sink) => sink,
            Err(e) => {
                broadcaster.unsubscribe(subscriber_id);
                return Err(e.into());
            }
        };
        info!(subscriber_id, "Event stream opened");

        let result: SubscriptionResult = loop {
            tokio::select! {
                _ = sink.closed() => break Ok(()),
                event = subscription.recv() => {
                    let Some(event) = event else {
                        debug!(subscriber_id, "Subscriber dropped by broadcaster");
                        break Ok(());
                    };
                    let message = match SubscriptionMessage::from_json(&EventNotification::from(event.as_ref())) {
                        Ok(message) => message,
                        Err(e) => break Err(e.into()),
                    };
                    if sink.send(message).await.is_err() {
                        break Ok(());
                    }
                }
            }
        };

        broadcaster.unsubscribe(subscriber_id);
        info!(subscriber_id, "Event stream closed");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use queuedesk_core::application::ServiceOptions;
    use queuedesk_core::domain::CodeStatus;
    use queuedesk_core::port::mocks::{InMemoryCodeStore, SteppingClock};
    use std::sync::Arc;

    fn handler() -> RpcHandler {
        RpcHandler::new(QueueDeskServices::build(
            Arc::new(InMemoryCodeStore::new()),
            Arc::new(SteppingClock::new(1_000, 1_000)),
            ServiceOptions::default(),
        ))
    }

    async fn queue(handler: &RpcHandler) -> QueueDto {
        handler
            .create_queue(CreateQueueParams {
                name: "desk".to_string(),
                min_attention_time_secs: Some(60),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_call_and_estimate() {
        let handler = handler();
        let queue = queue(&handler).await;

        let first = handler
            .resolve_visitor(ResolveVisitorRequest {
                visitor_id: "a".into(),
                queue_id: queue.id,
            })
            .await
            .unwrap();
        let second = handler
            .resolve_visitor(ResolveVisitorRequest {
                visitor_id: "b".into(),
                queue_id: queue.id,
            })
            .await
            .unwrap();

        let estimate = handler.estimated_time(IdRequest { id: second.id }).await.unwrap();
        assert_eq!(estimate.estimated_secs, 60);

        let called = handler
            .call_next(QueueIdRequest { queue_id: queue.id })
            .await
            .unwrap();
        assert_eq!(called.next.unwrap().access_code.id, first.id);

        let current = handler
            .current_code(QueueIdRequest { queue_id: queue.id })
            .await
            .unwrap();
        assert_eq!(current.current.unwrap().status, CodeStatus::Attending);

        let remaining = handler
            .remaining(QueueIdRequest { queue_id: queue.id })
            .await
            .unwrap();
        assert_eq!(remaining.remaining, 1);
    }

    #[tokio::test]
    async fn test_empty_queue_call_returns_null_next() {
        let handler = handler();
        let queue = queue(&handler).await;
        let called = handler
            .call_next(QueueIdRequest { queue_id: queue.id })
            .await
            .unwrap();
        assert!(called.next.is_none());
    }

    #[tokio::test]
    async fn test_errors_carry_codes() {
        let handler = handler();
        let err = handler.get_code(IdRequest { id: 1 }).await.unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);

        let err = handler
            .create_queue(CreateQueueParams {
                name: " ".into(),
                min_attention_time_secs: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_update_queue_partial() {
        let handler = handler();
        let queue = queue(&handler).await;
        let updated = handler
            .update_queue(UpdateQueueParams {
                id: queue.id,
                name: None,
                min_attention_time_secs: Some(90),
            })
            .await
            .unwrap();
        assert_eq!(updated.name, "desk");
        assert_eq!(updated.min_attention_time_secs, 90);
    }

    #[tokio::test]
    async fn test_stats() {
        let handler = handler();
        let queue = queue(&handler).await;
        handler.start_queue(IdRequest { id: queue.id }).await.unwrap();
        handler
            .create_code(CreateCodeParams {
                queue_id: queue.id,
                visitor_id: None,
                status: None,
                created_at: None,
            })
            .await
            .unwrap();

        let stats = handler.stats().await.unwrap();
        assert_eq!(stats.queues, 1);
        assert_eq!(stats.waiting_codes, 1);
        assert_eq!(stats.subscribers, 0);
    }
}
