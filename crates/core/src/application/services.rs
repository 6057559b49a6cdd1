// Service wiring shared by the daemon, the API layer and tests

use crate::application::broadcaster::EventBroadcaster;
use crate::application::code_service::AccessCodeService;
use crate::application::constants::DEFAULT_SUBSCRIBER_BUFFER;
use crate::application::dispatcher::{QueueDispatcher, RemainingScope};
use crate::application::key_lock::KeyedLocks;
use crate::application::lifecycle::QueueLifecycle;
use crate::application::queue_service::QueueService;
use crate::application::resolver::CodeResolver;
use crate::port::{CodeStore, TimeProvider};
use std::sync::Arc;

/// Tunables for [`QueueDeskServices::build`]
#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub remaining_scope: RemainingScope,
    pub subscriber_buffer: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            remaining_scope: RemainingScope::default(),
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

/// Every application service over one store, one broadcaster and one set of
/// per-queue locks
#[derive(Clone)]
pub struct QueueDeskServices {
    pub dispatcher: Arc<QueueDispatcher>,
    pub resolver: Arc<CodeResolver>,
    pub lifecycle: Arc<QueueLifecycle>,
    pub codes: Arc<AccessCodeService>,
    pub queues: Arc<QueueService>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub remaining_scope: RemainingScope,
}

impl QueueDeskServices {
    pub fn build(
        store: Arc<dyn CodeStore>,
        time_provider: Arc<dyn TimeProvider>,
        options: ServiceOptions,
    ) -> Self {
        let broadcaster = Arc::new(EventBroadcaster::new(options.subscriber_buffer));
        let queue_locks = Arc::new(KeyedLocks::new());

        Self {
            dispatcher: Arc::new(QueueDispatcher::new(
                Arc::clone(&store),
                Arc::clone(&time_provider),
                Arc::clone(&broadcaster),
                Arc::clone(&queue_locks),
                options.remaining_scope,
            )),
            resolver: Arc::new(CodeResolver::new(
                Arc::clone(&store),
                Arc::clone(&time_provider),
                Arc::clone(&broadcaster),
            )),
            lifecycle: Arc::new(QueueLifecycle::new(
                Arc::clone(&store),
                Arc::clone(&broadcaster),
                Arc::clone(&queue_locks),
            )),
            codes: Arc::new(AccessCodeService::new(
                Arc::clone(&store),
                Arc::clone(&time_provider),
                Arc::clone(&broadcaster),
                queue_locks,
            )),
            queues: Arc::new(QueueService::new(store, time_provider)),
            broadcaster,
            remaining_scope: options.remaining_scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::queue_service::CreateQueueRequest;
    use crate::domain::{CodeStatus, EventName};
    use crate::port::mocks::{InMemoryCodeStore, SteppingClock};

    #[tokio::test]
    async fn test_services_share_broadcaster_and_store() {
        let services = QueueDeskServices::build(
            Arc::new(InMemoryCodeStore::new()),
            Arc::new(SteppingClock::new(0, 1)),
            ServiceOptions::default(),
        );
        let mut events = services.broadcaster.subscribe();

        let queue = services
            .queues
            .create_queue(CreateQueueRequest {
                name: "desk".to_string(),
                min_attention_time_secs: None,
            })
            .await
            .unwrap();
        services.lifecycle.start_queue(queue.id).await.unwrap();
        let code = services.resolver.resolve_by_visitor("v", queue.id).await.unwrap();
        let next = services.dispatcher.call_next_code(queue.id).await.unwrap().unwrap();

        assert_eq!(next.access_code.id, code.id);
        assert_eq!(next.access_code.status, CodeStatus::Attending);

        let names: Vec<_> = std::iter::from_fn(|| events.try_recv()).map(|e| e.name).collect();
        assert_eq!(
            names,
            vec![
                EventName::QueueStarted,
                EventName::NewCodeAdded,
                EventName::NextCodeCalled
            ]
        );
    }
}
