use super::{
    dispatch::{ArgumentError, DispatchError},
    rpc::CallError,
};
use crate::transport::ConnectionError;

/// A method call as typed on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicRequest {
    /// The method name (e.g. `query_disk_info`).
    pub method: String,
    /// Positional arguments, each one a `simplejson` encoded request.
    pub args: Vec<String>,
}

impl DynamicRequest {
    pub fn new<I, S>(method: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method: method.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Errors that can occur while preparing a request, before any connection exists.
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Argument(#[from] ArgumentError),
}

/// Errors that can occur during a single-shot dynamic call.
#[derive(Debug, thiserror::Error)]
pub enum DynamicCallError {
    #[error(transparent)]
    Prepare(#[from] PrepareError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Call(#[from] CallError),
}
