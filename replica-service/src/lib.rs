//! # Replica Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide a replica admin server
//! for integration testing the `radmin` CLI and `radmin-core`.
//! It is not intended for production use.
//!
//! The server speaks every protocol over a raw socket, a framed socket or HTTP, and
//! dispatches decoded calls to a [`ReplicaHandler`].
mod handler;
mod server;

pub use handler::{FakeReplica, ReplicaHandler, process};
pub use server::TestServer;
