//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP and WebSocket on one TCP port. Subscriptions need the
//! WebSocket transport.

use crate::handler::RpcHandler;
use crate::types::{
    CreateCodeParams, CreateQueueParams, IdRequest, QueueIdRequest, ResolveVisitorRequest,
    SearchCodesRequest, UpdateCodeParams, UpdateQueueParams,
};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use queuedesk_core::application::QueueDeskServices;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9530;

/// Subscription method names
pub const SUBSCRIBE_METHOD: &str = "events.subscribe.v1";
pub const NOTIFICATION_METHOD: &str = "events.notification";
pub const UNSUBSCRIBE_METHOD: &str = "events.unsubscribe.v1";

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// Register `$name` -> `handler.$method(params)`; the params-less form skips parsing
macro_rules! register {
    ($module:ident, $handler:expr, $name:literal, $method:ident($req:ty)) => {{
        let handler = Arc::clone(&$handler);
        $module
            .register_async_method($name, move |params, _, _| {
                let handler = Arc::clone(&handler);
                async move {
                    let req: $req = params.parse()?;
                    handler.$method(req).await
                }
            })
            .map_err(|e| e.to_string())?;
    }};
    ($module:ident, $handler:expr, $name:literal, $method:ident()) => {{
        let handler = Arc::clone(&$handler);
        $module
            .register_async_method($name, move |_, _, _| {
                let handler = Arc::clone(&handler);
                async move { handler.$method().await }
            })
            .map_err(|e| e.to_string())?;
    }};
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, services: QueueDeskServices) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(services)),
        }
    }

    /// Every method and the event subscription, without a transport
    pub fn into_module(self) -> Result<RpcModule<()>, String> {
        build_module(self.handler)
    }

    /// Bind and start serving; the returned handle stops the server
    pub async fn start(self) -> Result<ServerHandle, String> {
        self.start_with_addr().await.map(|(_, handle)| handle)
    }

    /// Like [`RpcServer::start`], also returning the bound address (port 0 picks one)
    pub async fn start_with_addr(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = build_module(self.handler)?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started successfully");
        Ok((local_addr, handle))
    }
}

fn build_module(handler: Arc<RpcHandler>) -> Result<RpcModule<()>, String> {
    let mut module = RpcModule::new(());

    // code.*
    register!(module, handler, "code.get.v1", get_code(IdRequest));
    register!(module, handler, "code.get_composite.v1", get_code_composite(IdRequest));
    register!(module, handler, "code.search.v1", search_codes(SearchCodesRequest));
    register!(
        module,
        handler,
        "code.search_composite.v1",
        search_code_composites(SearchCodesRequest)
    );
    register!(
        module,
        handler,
        "code.resolve_visitor.v1",
        resolve_visitor(ResolveVisitorRequest)
    );
    register!(module, handler, "code.call_next.v1", call_next(QueueIdRequest));
    register!(module, handler, "code.current.v1", current_code(QueueIdRequest));
    register!(module, handler, "code.estimated_time.v1", estimated_time(IdRequest));
    register!(module, handler, "code.remaining.v1", remaining(QueueIdRequest));
    register!(module, handler, "code.create.v1", create_code(CreateCodeParams));
    register!(module, handler, "code.update.v1", update_code(UpdateCodeParams));
    register!(module, handler, "code.delete.v1", delete_code(IdRequest));

    // queue.*
    register!(module, handler, "queue.get.v1", get_queue(IdRequest));
    register!(module, handler, "queue.list.v1", list_queues());
    register!(module, handler, "queue.create.v1", create_queue(CreateQueueParams));
    register!(module, handler, "queue.update.v1", update_queue(UpdateQueueParams));
    register!(module, handler, "queue.delete.v1", delete_queue(IdRequest));
    register!(module, handler, "queue.start.v1", start_queue(IdRequest));

    // admin.*
    register!(module, handler, "admin.stats.v1", stats());

    // events.*
    let events_handler = Arc::clone(&handler);
    module
        .register_subscription(
            SUBSCRIBE_METHOD,
            NOTIFICATION_METHOD,
            UNSUBSCRIBE_METHOD,
            move |_, pending, _, _| {
                let handler = Arc::clone(&events_handler);
                async move { handler.stream_events(pending).await }
            },
        )
        .map_err(|e| e.to_string())?;

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CallNextResponse, QueueDto};
    use jsonrpsee::core::params::{ArrayParams, ObjectParams};
    use queuedesk_core::application::ServiceOptions;
    use queuedesk_core::port::mocks::{InMemoryCodeStore, SteppingClock};
    use serde_json::json;

    fn object(value: serde_json::Value) -> ObjectParams {
        let mut params = ObjectParams::new();
        if let serde_json::Value::Object(map) = value {
            for (key, value) in map {
                params.insert(&key, value).unwrap();
            }
        }
        params
    }

    fn module() -> RpcModule<()> {
        let services = QueueDeskServices::build(
            Arc::new(InMemoryCodeStore::new()),
            Arc::new(SteppingClock::new(0, 1)),
            ServiceOptions::default(),
        );
        RpcServer::new(RpcServerConfig::default(), services)
            .into_module()
            .unwrap()
    }

    #[tokio::test]
    async fn test_methods_are_registered() {
        let module = module();
        for name in [
            "code.get.v1",
            "code.resolve_visitor.v1",
            "code.call_next.v1",
            "queue.start.v1",
            "admin.stats.v1",
            SUBSCRIBE_METHOD,
            UNSUBSCRIBE_METHOD,
        ] {
            assert!(module.method(name).is_some(), "{} missing", name);
        }
    }

    #[tokio::test]
    async fn test_call_through_module() {
        let module = module();
        let queue: QueueDto = module
            .call("queue.create.v1", object(json!({"name": "desk"})))
            .await
            .unwrap();
        assert!(!queue.started);

        let called: CallNextResponse = module
            .call("code.call_next.v1", object(json!({"queue_id": queue.id})))
            .await
            .unwrap();
        assert!(called.next.is_none());
    }

    #[tokio::test]
    async fn test_subscription_receives_events() {
        let module = module();
        let mut sub = module
            .subscribe_unbounded(SUBSCRIBE_METHOD, ArrayParams::new())
            .await
            .unwrap();

        let queue: QueueDto = module
            .call("queue.create.v1", object(json!({"name": "desk"})))
            .await
            .unwrap();
        let _: QueueDto = module
            .call("queue.start.v1", object(json!({"id": queue.id})))
            .await
            .unwrap();

        let (notification, _id) = sub.next::<serde_json::Value>().await.unwrap().unwrap();
        assert_eq!(notification["name"], "QUEUE_STARTED");
        assert_eq!(notification["payload"]["id"], queue.id);
    }
}
