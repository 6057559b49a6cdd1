// Application Layer - Use Cases and Business Logic

pub mod broadcaster;
pub mod code_service;
pub mod constants;
pub mod dispatcher;
pub mod key_lock;
pub mod lifecycle;
pub mod queue_service;
pub mod resolver;
pub mod services;

// Re-exports
pub use broadcaster::{BroadcastReport, EventBroadcaster, SubscriberId, Subscription};
pub use code_service::{AccessCodeService, CodeStatusCounts, CreateCodeRequest};
pub use dispatcher::{QueueDispatcher, RemainingScope};
pub use key_lock::KeyedLocks;
pub use lifecycle::QueueLifecycle;
pub use queue_service::{CreateQueueRequest, QueueService};
pub use resolver::CodeResolver;
pub use services::{QueueDeskServices, ServiceOptions};
