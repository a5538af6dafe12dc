//! # Client State: Offline
//!
//! The `RadminClient` behavior before a connection exists: configuration
//! resolution, method lookup and argument decoding.
use super::{
    DynamicCallError, DynamicRequest, Offline, Online, PrepareError, RadminClient,
    dispatch::{DispatchTable, MethodEntry, Request, Response},
    rpc::ReplicaClient,
};
use crate::transport::{ConfigError, Connection, ConnectionConfig, ConnectionError, Endpoint};
use tracing::{debug, warn};

impl RadminClient<Offline> {
    /// Resolves `config` into an endpoint and builds the dispatch table.
    ///
    /// # Returns
    ///
    /// * `Ok(RadminClient<Offline>)` - The prepared, disconnected client.
    /// * `Err(ConfigError)` - If the URL, host, headers or protocol name are invalid.
    pub fn offline(config: &ConnectionConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            state: Offline {
                endpoint: config.resolve()?,
                table: DispatchTable::new(),
            },
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.state.endpoint
    }

    pub fn lookup(&self, method: &str) -> Result<&'static MethodEntry, PrepareError> {
        Ok(self.state.table.lookup(method)?)
    }

    /// Looks up the method and decodes its argument.
    pub fn prepare(&self, request: &DynamicRequest) -> Result<Request, PrepareError> {
        let entry = self.lookup(&request.method)?;
        Ok(entry.decode(&request.args)?)
    }

    /// Opens the resolved transport.
    pub async fn connect(self) -> Result<RadminClient<Online>, ConnectionError> {
        let Offline { endpoint, table } = self.state;
        let connection = Connection::open(&endpoint.target).await?;
        debug!(endpoint = %endpoint.target, protocol = %endpoint.protocol, "connected");

        Ok(RadminClient {
            state: Online {
                client: ReplicaClient::new(connection, endpoint.protocol),
                table,
            },
        })
    }

    /// Runs one complete call: prepare, connect, invoke, close.
    ///
    /// The connection is closed whether or not the call succeeds. No connection is
    /// opened when the request cannot be prepared.
    pub async fn dynamic(self, request: DynamicRequest) -> Result<Response, DynamicCallError> {
        let prepared = self.prepare(&request)?;

        let mut client = self.connect().await?;
        let result = client.call(prepared).await;
        if let Err(e) = client.close().await {
            warn!(error = %e, "failed to close the connection");
        }

        Ok(result?)
    }
}
