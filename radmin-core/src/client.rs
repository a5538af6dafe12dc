//! # Radmin Client
//!
//! This module implements the single-shot call path: resolve the configuration,
//! look up the method, decode its argument, connect, invoke and close.
//!
//! The [`RadminClient`] uses a **Typestate Pattern** so that everything that can fail
//! without touching the network happens before a connection exists:
//!
//! 1. **[`Offline`]**: The configuration is resolved and the dispatch table is built.
//!    Requests can be looked up and decoded, but nothing can be sent.
//! 2. **[`Online`]**: A transport is open and wrapped in the selected protocol.
//!    Requests are invoked here, and the connection is released with
//!    [`RadminClient::close`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use radmin_core::client::{DynamicRequest, RadminClient};
//! use radmin_core::transport::ConnectionConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConnectionConfig {
//!     host: "10.0.0.1:34801".to_string(),
//!     ..Default::default()
//! };
//! let client = RadminClient::offline(&config)?;
//! let response = client
//!     .dynamic(DynamicRequest::new("query_disk_info", [r#"{"node":"n1"}"#]))
//!     .await?;
//! println!("{}", response.render()?);
//! # Ok(())
//! # }
//! ```
pub mod dispatch;
pub mod offline;
pub mod online;
pub mod rpc;
mod types;

pub use types::*;

use crate::transport::Endpoint;
use dispatch::DispatchTable;
use rpc::ReplicaClient;

/// The main client for the replica admin service.
///
/// The generic parameter `T` represents the current state of the client.
#[derive(Debug)]
pub struct RadminClient<T> {
    state: T,
}

/// State: configuration resolved, not connected.
#[derive(Debug, Clone)]
pub struct Offline {
    endpoint: Endpoint,
    table: DispatchTable,
}

/// State: connected, protocol selected.
#[derive(Debug)]
pub struct Online {
    client: ReplicaClient,
    table: DispatchTable,
}
