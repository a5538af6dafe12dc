//! # Radmin Core
//!
//! `radmin-core` is the library behind the `radmin` CLI, a single-shot client for the
//! replica admin RPC service. One invocation opens one connection, performs one call,
//! and closes the connection.
//!
//! ## Key Components
//!
//! * **[`RadminClient`]:** The main entry point. It resolves the connection
//!   configuration, decodes the textual request argument, and dispatches the call.
//! * **[`transport`]:** Resolution of host, port, URL and flags into a single transport
//!   (raw socket, framed socket or HTTP with custom headers).
//! * **[`protocol`]:** The four serialization protocols (`binary`, `compact`,
//!   `simplejson`, `json`) behind one reader/writer contract.
//! * **[`idl`]:** Typed service structures, including [`RpcAddress`], the packed
//!   IPv4 address and port.
//!
//! ## Errors
//!
//! Each phase of a call reports its own error type, so callers can tell a bad
//! configuration ([`transport::ConfigError`]) from a bad argument
//! ([`client::dispatch::ArgumentError`]), a failed connect
//! ([`transport::ConnectionError`]) or a failure during the call
//! ([`client::rpc::CallError`]).
pub mod client;
pub mod idl;
pub mod protocol;
pub mod transport;

pub use client::{DynamicCallError, DynamicRequest, RadminClient};
pub use idl::RpcAddress;
