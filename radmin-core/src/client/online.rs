//! # Client State: Online
//!
//! The `RadminClient` behavior once a transport is open.
use super::{
    Online, RadminClient,
    dispatch::{MethodEntry, Request, Response},
    rpc::{CallError, ReplicaClient},
};
use crate::{client::dispatch::DispatchError, transport::TransportError};

impl RadminClient<Online> {
    pub fn lookup(&self, method: &str) -> Result<&'static MethodEntry, DispatchError> {
        self.state.table.lookup(method)
    }

    /// Invokes a decoded request and returns the typed response.
    pub async fn call(&mut self, request: Request) -> Result<Response, CallError> {
        request.invoke(&mut self.state.client).await
    }

    /// Direct access to the typed stub.
    pub fn replica(&mut self) -> &mut ReplicaClient {
        &mut self.state.client
    }

    /// Releases the transport.
    pub async fn close(self) -> Result<(), TransportError> {
        self.state.client.close().await
    }
}
