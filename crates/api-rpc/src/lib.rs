//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 server for QueueDesk: queue dispatch, visitor codes, record
//! management and the live event stream.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
