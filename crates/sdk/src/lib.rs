//! QueueDesk SDK - Rust Client Library
//!
//! Client for the QueueDesk daemon: queue administration, visitor codes and
//! live queue events.
//!
//! # Example
//!
//! ```no_run
//! use queuedesk_sdk::{EventStream, QueueDeskClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = QueueDeskClient::connect("http://127.0.0.1:9530").await?;
//!     let mut events = EventStream::connect("ws://127.0.0.1:9530").await?;
//!
//!     let queue = client.create_queue("front-desk", Some(120)).await?;
//!     client.start_queue(queue.id).await?;
//!     client.resolve_visitor("visitor-1", queue.id).await?;
//!
//!     while let Some(event) = events.next().await {
//!         println!("{}", event?.name);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::{EventStream, QueueDeskClient};
pub use error::{code, Result, SdkError};
pub use types::{
    AccessCode, AccessCodeComposite, CallNextResponse, CreateCodeRequest, CreateQueueRequest,
    CurrentCodeResponse, DeleteResponse, EstimatedTimeResponse, EventNotification, NextCode, Page,
    Queue, RemainingResponse, SearchCodesRequest, StatsResponse, UpdateCodeRequest,
    UpdateQueueRequest,
};
