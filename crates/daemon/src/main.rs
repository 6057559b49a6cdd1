//! QueueDesk Daemon - Main Entry Point
//! Composition root: config, logging, database, services, JSON-RPC server

mod config;
mod logging;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use config::DaemonConfig;
use queuedesk_api_rpc::{RpcServer, RpcServerConfig};
use queuedesk_core::application::QueueDeskServices;
use queuedesk_core::port::time_provider::SystemTimeProvider;
use queuedesk_infra_sqlite::open_store;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let config = DaemonConfig::load().context("Failed to load configuration")?;
    let _log_guard = logging::init(&config).context("Failed to initialize logging")?;

    info!("QueueDesk v{} starting...", VERSION);

    // 2. Database
    let database_url = config.database_url()?;
    info!(database_url = %database_url, "Initializing database...");
    let store = open_store(&database_url)
        .await
        .context("Database initialization failed")?;

    // 3. Services (DI wiring)
    let services = QueueDeskServices::build(
        Arc::new(store),
        Arc::new(SystemTimeProvider),
        config.service_options(),
    );
    info!(
        remaining_scope = ?config.remaining_scope,
        subscriber_buffer = config.subscriber_buffer,
        "Services ready"
    );

    // 4. JSON-RPC server
    let rpc_config = RpcServerConfig {
        host: config.rpc_host.clone(),
        port: config.rpc_port,
    };
    let rpc_handle = RpcServer::new(rpc_config, services)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!("System ready. Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 6. Graceful shutdown
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, rpc_handle.stopped())
        .await
        .is_err()
    {
        warn!("RPC server did not stop within {:?}", SHUTDOWN_TIMEOUT);
    }

    info!("Shutdown complete.");
    Ok(())
}
