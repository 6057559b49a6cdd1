//! Simple SDK Example
//!
//! Walks one visitor through a queue while printing the live events.
//!
//! # Usage
//!
//! 1. Start the daemon:
//!    ```bash
//!    cargo run --package queuedesk-daemon
//!    ```
//!
//! 2. Run this example:
//!    ```bash
//!    cargo run --package queuedesk-sdk --example simple
//!    ```

use anyhow::Result;
use queuedesk_sdk::{EventStream, QueueDeskClient};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    println!("QueueDesk SDK - Simple Example");
    println!("==============================\n");

    let client = QueueDeskClient::connect("http://127.0.0.1:9530").await?;
    let mut events = EventStream::connect("ws://127.0.0.1:9530").await?;
    println!("Connected\n");

    let queue = client.create_queue("example-desk", Some(90)).await?;
    client.start_queue(queue.id).await?;
    println!("Queue {} ({}) started", queue.id, queue.name);

    let code = client.resolve_visitor("example-visitor", queue.id).await?;
    let estimate = client.estimated_time(code.id).await?;
    println!(
        "Visitor got code {} ({}), estimated wait {}s",
        code.id, code.status, estimate.estimated_secs
    );

    let called = client.call_next(queue.id).await?;
    if let Some(next) = called.next {
        println!("Now attending code {}", next.access_code.id);
    }

    let remaining = client.remaining(queue.id).await?;
    println!("Remaining: {} ({})\n", remaining.remaining, remaining.scope);

    println!("Events:");
    for _ in 0..3 {
        match tokio::time::timeout(Duration::from_secs(1), events.next()).await {
            Ok(Some(event)) => {
                let event = event?;
                println!("  {} {}", event.name, event.payload);
            }
            _ => break,
        }
    }

    Ok(())
}
